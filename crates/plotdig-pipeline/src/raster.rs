//! In-memory image buffers held by the pipeline.
//!
//! A [`Raster`] is either single-channel (`Gray`) or three-channel
//! interleaved (`Rgb`), 8 bits per sample. Alpha is dropped on decode.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::types::Dimensions;

/// An 8-bit image buffer with one or three channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    /// Single-channel luminance.
    Gray(GrayImage),
    /// Three-channel interleaved color.
    Rgb(RgbImage),
}

impl Raster {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Rgb(img) => img.width(),
        }
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Rgb(img) => img.height(),
        }
    }

    /// Width and height together.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Number of interleaved samples per pixel (1 or 3).
    #[must_use]
    pub const fn channels(&self) -> u8 {
        match self {
            Self::Gray(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    /// Raw interleaved samples, row-major.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Rgb(img) => img.as_raw(),
        }
    }

    /// The single-channel buffer, if this raster is grayscale.
    #[must_use]
    pub const fn as_gray(&self) -> Option<&GrayImage> {
        match self {
            Self::Gray(img) => Some(img),
            Self::Rgb(_) => None,
        }
    }

    /// Luminance view of this raster: borrowed when already gray,
    /// converted otherwise.
    #[must_use]
    pub fn to_luma(&self) -> std::borrow::Cow<'_, GrayImage> {
        match self {
            Self::Gray(img) => std::borrow::Cow::Borrowed(img),
            Self::Rgb(img) => std::borrow::Cow::Owned(image::imageops::grayscale(img)),
        }
    }

    /// Three-channel copy of this raster (gray samples are replicated).
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Gray(img) => DynamicImage::ImageLuma8(img.clone()).to_rgb8(),
            Self::Rgb(img) => img.clone(),
        }
    }
}

impl From<DynamicImage> for Raster {
    /// Luma sources (with or without alpha, any bit depth) become
    /// `Gray`; everything else becomes `Rgb`.
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(img) => Self::Gray(img),
            DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => Self::Gray(image.to_luma8()),
            DynamicImage::ImageRgb8(img) => Self::Rgb(img),
            other => Self::Rgb(other.to_rgb8()),
        }
    }
}

impl From<Raster> for DynamicImage {
    fn from(raster: Raster) -> Self {
        match raster {
            Raster::Gray(img) => Self::ImageLuma8(img),
            Raster::Rgb(img) => Self::ImageRgb8(img),
        }
    }
}
