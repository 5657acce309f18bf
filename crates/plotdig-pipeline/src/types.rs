//! Shared types for the plotdig image processing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationError;
use crate::coords::CoordinateError;
use crate::resize::ResizeFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel buffers without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference
/// three-channel buffers without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in continuous coordinates (image or user space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl From<PixelPoint> for Point {
    fn from(p: PixelPoint) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

/// An integer pixel position, as produced by contour discovery.
///
/// Unlike [`Point`] this is `Eq + Hash`, so contour geometry can be
/// compared exactly and fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column (pixels from left edge).
    pub x: u32,
    /// Row (pixels from top edge).
    pub y: u32,
}

impl PixelPoint {
    /// Create a new pixel position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned pixel region `(x, y, width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Key of a contour inside a [`ContourRegistry`](crate::registry::ContourRegistry).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContourKey(pub u32);

impl fmt::Display for ContourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tunable parameters that the adapter layer may override.
///
/// Operations on [`Pipeline`](crate::Pipeline) take their explicit
/// arguments directly; this config only supplies defaults for the
/// parameters an interactive user never types (ROI padding, corner
/// tolerance, hit radius).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of the image width/height added on each side of a
    /// contour's bounding box when computing its search region.
    pub roi_padding: f64,

    /// Ramer-Douglas-Peucker tolerance (pixels) used when splitting a
    /// contour at its corners.
    pub split_epsilon: f64,

    /// Maximum distance (pixels) between a query point and a contour
    /// segment for the contour to count as hit.
    pub hit_threshold: f64,

    /// Resampling filter used by named-size resizes.
    pub resize_filter: ResizeFilter,

    /// Show the processed buffer instead of the original-with-contours
    /// overlay.
    pub show_pipeline: bool,
}

impl PipelineConfig {
    /// Default ROI padding fraction.
    pub const DEFAULT_ROI_PADDING: f64 = 0.05;
    /// Default corner tolerance for contour splitting.
    pub const DEFAULT_SPLIT_EPSILON: f64 = 2.0;
    /// Default hit-test radius.
    pub const DEFAULT_HIT_THRESHOLD: f64 = 10.0;
    /// Default resize filter.
    pub const DEFAULT_RESIZE_FILTER: ResizeFilter = ResizeFilter::Triangle;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            roi_padding: Self::DEFAULT_ROI_PADDING,
            split_epsilon: Self::DEFAULT_SPLIT_EPSILON,
            hit_threshold: Self::DEFAULT_HIT_THRESHOLD,
            resize_filter: Self::DEFAULT_RESIZE_FILTER,
            show_pipeline: false,
        }
    }
}

/// Failure to bring an image into the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file extension is not one of the supported image formats.
    #[error("unsupported image extension: {0:?}")]
    UnsupportedExtension(String),

    /// The file could not be read.
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

/// Errors that can occur during pipeline operations.
///
/// Every error leaves the pipeline in the state it had before the
/// failing call.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Loading an image failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// An argument was outside the accepted set (unknown size name,
    /// blur kind, edge kind, clear scope, non-positive pass count...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested contour key is not in the registry.
    #[error("contour {0} not found")]
    NotFound(ContourKey),

    /// The operation needs an image but none is loaded.
    #[error("no image loaded")]
    Empty,

    /// Contour discovery needs a single-channel buffer.
    #[error("contour discovery requires a single-channel image; run edge detection first")]
    NotSingleChannel,

    /// A coordinate string was malformed.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    /// Calibration could not be established.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl PipelineError {
    /// Whether this error reports bad user input rather than a caller
    /// bug or an I/O failure.
    ///
    /// Adapters show validation errors inline next to the control that
    /// produced them.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Coordinate(_) | Self::Calibration(_)
        )
    }
}
