//! Edge detection with automatically chosen thresholds.
//!
//! The Canny thresholds are derived from the median sample `m` of the
//! input: `low = max(0, (1 - σ)·m)`, `high = min(255, (1 + σ)·m)` with
//! σ = [`SIGMA`]. Both are then floored at [`MIN_THRESHOLD`] so a dark
//! image (median 0) does not turn every pixel into an edge. Sobel
//! responses are integers, so a nonzero magnitude is at least 1 and the
//! floor behaves exactly like requiring a gradient strictly above 0.

use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::types::PipelineError;

/// Sensitivity of the automatic threshold band around the median.
pub const SIGMA: f32 = 0.33;

/// Minimum allowed Canny threshold.
///
/// A threshold of zero accepts every pixel with any gradient (including
/// none), flooding the edge map.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Which edge operator to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Canny with median-derived dual thresholds.
    #[default]
    Canny,
}

impl FromStr for EdgeKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canny" => Ok(Self::Canny),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown edge detector {other:?}"
            ))),
        }
    }
}

/// Low/high hysteresis thresholds actually used for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Weak-edge threshold.
    pub low: f32,
    /// Strong-edge threshold.
    pub high: f32,
}

/// Median of all samples (every channel) of `samples`.
///
/// For an even count this is the mean of the two middle values. An
/// empty slice has median 0.
#[must_use]
pub fn median(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut histogram = [0usize; 256];
    for &s in samples {
        histogram[usize::from(s)] += 1;
    }

    let n = samples.len();
    let (lo_rank, hi_rank) = ((n - 1) / 2, n / 2);
    let mut lo = None;
    let mut seen = 0usize;
    for (value, &count) in (0u8..=255).zip(histogram.iter()) {
        seen += count;
        if lo.is_none() && seen > lo_rank {
            lo = Some(value);
        }
        if seen > hi_rank {
            let lo = lo.unwrap_or(value);
            return (f32::from(lo) + f32::from(value)) / 2.0;
        }
    }
    0.0
}

/// Thresholds for an image whose median sample is `median`.
#[must_use]
pub fn auto_thresholds(median: f32) -> Thresholds {
    let high = ((1.0 + SIGMA) * median).min(255.0).max(MIN_THRESHOLD);
    let low = ((1.0 - SIGMA) * median).max(MIN_THRESHOLD).min(high);
    Thresholds { low, high }
}

/// Apply `kind` to `raster`, producing a single-channel 0/255 map.
///
/// Color rasters are reduced to luminance first. Returns the thresholds
/// used alongside the map.
#[must_use = "returns the binary edge map"]
pub fn detect_edges(raster: &Raster, kind: EdgeKind) -> (GrayImage, Thresholds) {
    match kind {
        EdgeKind::Canny => {
            let thresholds = auto_thresholds(median(raster.as_raw()));
            let luma = raster.to_luma();
            let edges = crate::canny::canny(&luma, thresholds.low, thresholds.high);
            (edges, thresholds)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn edge_kind_parses() {
        assert_eq!("CANNY".parse::<EdgeKind>().unwrap(), EdgeKind::Canny);
        assert!(matches!(
            "sobel".parse::<EdgeKind>(),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn median_odd_and_even() {
        assert!((median(&[5, 1, 3]) - 3.0).abs() < f32::EPSILON);
        assert!((median(&[1, 2, 3, 10]) - 2.5).abs() < f32::EPSILON);
        assert!((median(&[]) - 0.0).abs() < f32::EPSILON);
        assert!((median(&[255; 7]) - 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn thresholds_bracket_median() {
        let t = auto_thresholds(100.0);
        assert!((t.low - 67.0).abs() < 1e-3);
        assert!((t.high - 133.0).abs() < 1e-3);
    }

    #[test]
    fn high_threshold_capped_at_255() {
        let t = auto_thresholds(250.0);
        assert!((t.high - 255.0).abs() < f32::EPSILON);
        assert!(t.low <= t.high);
    }

    #[test]
    fn dark_image_thresholds_floored() {
        let t = auto_thresholds(0.0);
        assert!((t.low - MIN_THRESHOLD).abs() < f32::EPSILON);
        assert!((t.high - MIN_THRESHOLD).abs() < f32::EPSILON);
    }

    #[test]
    fn detect_edges_is_binary_single_channel() {
        let img = image::RgbImage::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([240, 240, 240])
            }
        });
        let (edges, _) = detect_edges(&Raster::Rgb(img), EdgeKind::Canny);
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(edges.pixels().any(|p| p.0[0] == 255));
    }

    #[test]
    fn faintest_gradient_passes_the_floor() {
        // Median 0, so both thresholds sit at the floor; a one-level
        // line still produces edges.
        let img = GrayImage::from_fn(16, 16, |x, _| image::Luma([u8::from(x == 8)]));
        let (edges, t) = detect_edges(&Raster::Gray(img), EdgeKind::Canny);
        assert!((t.low - MIN_THRESHOLD).abs() < f32::EPSILON);
        assert!(edges.pixels().any(|p| p.0[0] == 255));
    }

    #[test]
    fn uniform_black_image_has_no_edges() {
        let (edges, t) = detect_edges(&Raster::Gray(GrayImage::new(16, 16)), EdgeKind::Canny);
        assert!((t.high - MIN_THRESHOLD).abs() < f32::EPSILON);
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }
}
