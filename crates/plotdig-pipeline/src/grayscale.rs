//! Grayscale conversion.
//!
//! Color rasters are reduced to a single luminance channel using the
//! `image` crate's weighting (`0.2126 R + 0.7152 G + 0.0722 B`).
//! Single-channel rasters pass through unchanged, which makes the
//! conversion idempotent.

use crate::raster::Raster;

/// Convert a raster to single-channel luminance.
///
/// Returns `None` when the raster is already grayscale so the caller
/// can skip the copy.
#[must_use = "returns the converted raster"]
pub fn to_gray(raster: &Raster) -> Option<Raster> {
    match raster {
        Raster::Gray(_) => None,
        Raster::Rgb(img) => Some(Raster::Gray(image::imageops::grayscale(img))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    #[test]
    fn gray_input_is_left_alone() {
        let raster = Raster::Gray(GrayImage::new(3, 3));
        assert!(to_gray(&raster).is_none());
    }

    #[test]
    fn output_dimensions_match_input() {
        let raster = Raster::Rgb(RgbImage::new(17, 31));
        let gray = to_gray(&raster).unwrap();
        assert_eq!(gray.width(), 17);
        assert_eq!(gray.height(), 31);
        assert_eq!(gray.channels(), 1);
    }

    #[test]
    fn conversion_weights_channels() {
        // Green carries the highest luminance weight, blue the lowest.
        let value = |rgb: [u8; 3]| {
            let raster = Raster::Rgb(RgbImage::from_pixel(1, 1, image::Rgb(rgb)));
            to_gray(&raster).unwrap().as_raw()[0]
        };
        let (r, g, b) = (value([255, 0, 0]), value([0, 255, 0]), value([0, 0, 255]));
        assert!(g > r && r > b, "expected G > R > B, got R={r} G={g} B={b}");
    }

    #[test]
    fn white_stays_white() {
        let raster = Raster::Rgb(RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255])));
        let gray = to_gray(&raster).unwrap();
        assert!(gray.as_raw().iter().all(|&v| v == 255));
    }
}
