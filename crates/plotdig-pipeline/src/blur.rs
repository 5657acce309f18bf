//! Gaussian smoothing with odd kernel sizes.
//!
//! Callers express blur either as a number of "passes" or as a strength
//! relative to the image size; both resolve to an odd kernel size `k` no
//! larger than the image's smaller side, from which the Gaussian sigma is
//! derived the same way OpenCV does for `sigma = 0`:
//! `0.3 * ((k - 1) / 2 - 1) + 0.8`.
//!
//! The actual filtering wraps [`imageproc::filter::gaussian_blur_f32`].
//! Color rasters are blurred one channel at a time.

use std::str::FromStr;

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::types::PipelineError;

/// Smallest kernel size ever applied.
pub const MIN_KERNEL: u32 = 3;

/// Which smoothing kernel to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurKind {
    /// Separable Gaussian kernel.
    #[default]
    Gaussian,
}

impl FromStr for BlurKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Self::Gaussian),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown blur kind {other:?}"
            ))),
        }
    }
}

/// How strongly to blur.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurAmount {
    /// Discrete number of blur steps; `n` passes give kernel `3 + 2(n-1)`.
    Passes(u32),
    /// Fraction of the smaller image dimension, rounded down to an odd
    /// kernel size of at least [`MIN_KERNEL`].
    Strength(f64),
}

impl BlurAmount {
    /// Resolve to an odd kernel size for an image of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for zero passes, a pass
    /// count whose kernel exceeds [`max_kernel`], or a strength outside
    /// `0.0..=1.0`.
    pub fn kernel_size(self, width: u32, height: u32) -> Result<u32, PipelineError> {
        let limit = max_kernel(width, height);
        match self {
            Self::Passes(0) => Err(PipelineError::InvalidArgument(
                "blur pass count must be at least 1".to_owned(),
            )),
            Self::Passes(n) => {
                let kernel = u64::from(MIN_KERNEL) + 2 * (u64::from(n) - 1);
                u32::try_from(kernel)
                    .ok()
                    .filter(|&k| k <= limit)
                    .ok_or_else(|| {
                        PipelineError::InvalidArgument(format!(
                            "{n} blur passes need a {kernel}px kernel; a {width}x{height} image allows at most {limit}"
                        ))
                    })
            }
            Self::Strength(f) if !(0.0..=1.0).contains(&f) => Err(PipelineError::InvalidArgument(
                format!("blur strength must be a fraction between 0 and 1, got {f}"),
            )),
            Self::Strength(f) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let raw = (f * f64::from(width.min(height))).floor() as u32;
                let odd = if raw % 2 == 0 { raw.saturating_sub(1) } else { raw };
                Ok(odd.clamp(MIN_KERNEL, limit))
            }
        }
    }
}

/// Largest kernel accepted for an image: the smaller side rounded down
/// to odd, but never below [`MIN_KERNEL`].
#[must_use]
pub const fn max_kernel(width: u32, height: u32) -> u32 {
    let side = if width < height { width } else { height };
    let odd = if side % 2 == 0 { side.saturating_sub(1) } else { side };
    if odd < MIN_KERNEL { MIN_KERNEL } else { odd }
}

/// Gaussian sigma for an odd kernel size.
#[must_use]
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let half = (kernel.saturating_sub(1) / 2) as f32;
    0.3f32.mul_add(half - 1.0, 0.8)
}

/// Blur a grayscale image with the kernel size `kernel`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, kernel: u32) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(image, sigma_for_kernel(kernel))
}

/// Blur an RGB image by blurring each channel independently.
///
/// Gaussian blur is linear and per-channel, so this is equivalent to
/// blurring in color space.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &RgbImage, kernel: u32) -> RgbImage {
    let (w, h) = (image.width(), image.height());
    let sigma = sigma_for_kernel(kernel);

    let blurred: [GrayImage; 3] = std::array::from_fn(|c| {
        let channel = GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]));
        imageproc::filter::gaussian_blur_f32(&channel, sigma)
    });

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Apply `kind` with kernel size `kernel` to a raster of either shape.
#[must_use = "returns the blurred raster"]
pub fn blur(raster: &Raster, kind: BlurKind, kernel: u32) -> Raster {
    match kind {
        BlurKind::Gaussian => match raster {
            Raster::Gray(img) => Raster::Gray(gaussian_blur(img, kernel)),
            Raster::Rgb(img) => Raster::Rgb(gaussian_blur_rgb(img, kernel)),
        },
    }
}
