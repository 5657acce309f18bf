//! Shrinking to a named target resolution.
//!
//! Targets come from a fixed table ([`SizeName`]). The longer source
//! axis is matched to the target's corresponding axis (width for
//! landscape and square images, height for portrait), and the other
//! axis follows from the aspect ratio. Resizing only ever shrinks: a
//! target wider than the current image is refused.

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::types::{Dimensions, PipelineError};

/// Named target resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeName {
    /// 640x480.
    Vga,
    /// 1280x720.
    Hd,
    /// 1920x1080.
    Fhd,
    /// 3840x2160.
    #[serde(rename = "4k")]
    Uhd4k,
}

impl SizeName {
    /// Every named size, smallest first.
    pub const ALL: [Self; 4] = [Self::Vga, Self::Hd, Self::Fhd, Self::Uhd4k];

    /// The target width and height for this name.
    #[must_use]
    pub const fn dimensions(self) -> Dimensions {
        match self {
            Self::Vga => Dimensions::new(640, 480),
            Self::Hd => Dimensions::new(1280, 720),
            Self::Fhd => Dimensions::new(1920, 1080),
            Self::Uhd4k => Dimensions::new(3840, 2160),
        }
    }
}

impl fmt::Display for SizeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vga => f.write_str("vga"),
            Self::Hd => f.write_str("hd"),
            Self::Fhd => f.write_str("fhd"),
            Self::Uhd4k => f.write_str("4k"),
        }
    }
}

impl FromStr for SizeName {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vga" => Ok(Self::Vga),
            "hd" => Ok(Self::Hd),
            "fhd" => Ok(Self::Fhd),
            "4k" => Ok(Self::Uhd4k),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown size name {other:?} (expected vga, hd, fhd or 4k)"
            ))),
        }
    }
}

/// Resampling filter used when shrinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Compute the aspect-preserving target size for `current` and `name`.
///
/// The result may be larger than `current`; callers decide whether to
/// refuse it.
#[must_use]
pub fn target_dimensions(current: Dimensions, name: SizeName) -> Dimensions {
    let target = name.dimensions();
    let (w, h) = (f64::from(current.width), f64::from(current.height));

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let round = |v: f64| v.round().max(1.0) as u32;

    if current.width >= current.height {
        let scale = f64::from(target.width) / w;
        Dimensions::new(target.width, round(h * scale))
    } else {
        let scale = f64::from(target.height) / h;
        Dimensions::new(round(w * scale), target.height)
    }
}

/// Resample `raster` to exactly `size` with `filter`.
#[must_use = "returns the resized raster"]
pub fn resize(raster: &Raster, size: Dimensions, filter: ResizeFilter) -> Raster {
    let dynamic = DynamicImage::from(raster.clone());
    let resized = dynamic.resize_exact(size.width, size.height, filter.to_image_filter());
    Raster::from(resized)
}
