//! Corner detection with the Ramer-Douglas-Peucker algorithm.
//!
//! Used by contour splitting: the points RDP keeps at a given tolerance
//! are the contour's corners. Open sequences are simplified end to end.
//! Closed sequences are cut at the point farthest from the first point
//! and each half (the second one wrapping back to the start) is
//! simplified separately, so the corner set does not depend on where
//! border following happened to start.

use crate::types::{PixelPoint, Point};

/// Indices (ascending) of the points RDP keeps.
///
/// Sequences with fewer than 3 points keep everything.
#[must_use]
pub fn corner_indices(points: &[PixelPoint], tolerance: f64, closed: bool) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }

    let mut kept = vec![false; n];
    if closed {
        let origin = Point::from(points[0]);
        let far = (1..n)
            .max_by(|&a, &b| {
                origin
                    .distance_squared(points[a].into())
                    .total_cmp(&origin.distance_squared(points[b].into()))
            })
            .unwrap_or(0);
        if far == 0 {
            kept[0] = true;
        } else {
            let first_half: Vec<usize> = (0..=far).collect();
            let second_half: Vec<usize> = (far..n).chain(std::iter::once(0)).collect();
            simplify_run(points, &first_half, tolerance, &mut kept);
            simplify_run(points, &second_half, tolerance, &mut kept);
        }
    } else {
        let run: Vec<usize> = (0..n).collect();
        simplify_run(points, &run, tolerance, &mut kept);
    }

    kept.iter()
        .enumerate()
        .filter(|&(_, &k)| k)
        .map(|(i, _)| i)
        .collect()
}

/// Break `points` into pieces that meet at the corners.
///
/// Walking the sequence, every corner ends the running piece (when it
/// has at least 2 points) and starts the next one, so neighboring
/// pieces share their corner point. A trailing run of at least 2 points
/// is kept. A sequence without interior corners comes back whole.
#[must_use]
pub fn split_at_corners(points: &[PixelPoint], tolerance: f64, closed: bool) -> Vec<Vec<PixelPoint>> {
    let mut is_corner = vec![false; points.len()];
    for i in corner_indices(points, tolerance, closed) {
        is_corner[i] = true;
    }

    let mut pieces = Vec::new();
    let mut run = Vec::new();
    for (&p, &corner) in points.iter().zip(&is_corner) {
        run.push(p);
        if corner {
            if run.len() >= 2 {
                pieces.push(std::mem::take(&mut run));
            }
            run.clear();
            run.push(p);
        }
    }
    if run.len() >= 2 {
        pieces.push(run);
    }
    pieces
}

/// Mark both ends of `run` and recurse between them.
///
/// `run` lists indices into `points` in walk order.
fn simplify_run(points: &[PixelPoint], run: &[usize], tolerance: f64, kept: &mut [bool]) {
    let (Some(&first), Some(&last)) = (run.first(), run.last()) else {
        return;
    };
    kept[first] = true;
    kept[last] = true;
    rdp_recurse(points, run, 0, run.len() - 1, tolerance, kept);
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line through them. If that distance exceeds `tolerance`, the point
/// is kept and both sub-runs are processed recursively.
fn rdp_recurse(
    points: &[PixelPoint],
    run: &[usize],
    start: usize,
    end: usize,
    tolerance: f64,
    kept: &mut [bool],
) {
    if end <= start + 1 {
        return;
    }

    let a = Point::from(points[run[start]]);
    let b = Point::from(points[run[end]]);
    let mut max_dist = 0.0;
    let mut max_pos = start;

    for pos in (start + 1)..end {
        let d = perpendicular_distance(points[run[pos]].into(), a, b);
        if d > max_dist {
            max_dist = d;
            max_pos = pos;
        }
    }

    if max_dist > tolerance {
        kept[run[max_pos]] = true;
        rdp_recurse(points, run, start, max_pos, tolerance, kept);
        rdp_recurse(points, run, max_pos, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
