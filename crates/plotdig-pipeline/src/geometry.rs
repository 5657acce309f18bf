//! Point-to-segment distance and contour hit testing.

use geo::Line;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::contour::Contour;
use crate::types::{ContourKey, Point};

/// Distance from `p` to the closed segment `a`-`b`.
///
/// The projection of `p` onto the segment's line is clamped to the
/// segment. A degenerate segment (`a == b`) measures the distance to
/// `a`.
#[must_use]
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq == 0.0 {
        return p.distance(a);
    }

    let t = (p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);
    let closest = Point::new(t.mul_add(dx, a.x), t.mul_add(dy, a.y));
    p.distance(closest)
}

const fn point_to_coord(p: Point) -> geo::Coord<f64> {
    geo::Coord { x: p.x, y: p.y }
}

/// A contour segment tagged with the key of the contour it belongs to.
type KeyedSegment = GeomWithData<Line<f64>, ContourKey>;

/// Spatial index over every segment of a set of contours.
///
/// Answers "which contour passes within `threshold` pixels of this
/// point", the hover/click test an interactive adapter needs. The
/// index is a snapshot: rebuild it after the registry changes.
#[derive(Debug)]
pub struct HitIndex {
    tree: RTree<KeyedSegment>,
}

impl HitIndex {
    /// Index the segments of `contours`.
    ///
    /// Closed contours also contribute their closing segment.
    pub fn build<'a>(contours: impl IntoIterator<Item = (ContourKey, &'a Contour)>) -> Self {
        let mut segments = Vec::new();
        for (key, contour) in contours {
            let pts = contour.points();
            for pair in pts.windows(2) {
                segments.push(segment(key, pair[0].into(), pair[1].into()));
            }
            if contour.closed()
                && pts.len() > 2
                && let (Some(&first), Some(&last)) = (pts.first(), pts.last())
            {
                segments.push(segment(key, last.into(), first.into()));
            }
        }
        Self {
            tree: RTree::bulk_load(segments),
        }
    }

    /// Number of indexed segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no segments are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The contour with the segment nearest to `p`, if that segment is
    /// strictly closer than `threshold`.
    #[must_use]
    pub fn hit(&self, p: Point, threshold: f64) -> Option<ContourKey> {
        let query = geo::Point::new(p.x, p.y);
        let nearest = self.tree.nearest_neighbor_iter(&query).next()?;
        let line = nearest.geom();
        let distance = point_segment_distance(
            p,
            Point::new(line.start.x, line.start.y),
            Point::new(line.end.x, line.end.y),
        );
        (distance < threshold).then_some(nearest.data)
    }
}

fn segment(key: ContourKey, a: Point, b: Point) -> KeyedSegment {
    GeomWithData::new(Line::new(point_to_coord(a), point_to_coord(b)), key)
}
