//! Canny edge detector over an already-smoothed grayscale image.
//!
//! Unlike [`imageproc::edges::canny`] this does not blur internally:
//! smoothing is an explicit, separately accounted pipeline step. The
//! hysteresis pass checks all 8 neighbors and never steps outside the
//! image (see <https://github.com/image-rs/imageproc/issues/705> for
//! the upstream border bug this avoids).

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Run Sobel gradients, non-maximum suppression and hysteresis.
///
/// Returns a binary image: 255 for edge pixels, 0 elsewhere. Pixels
/// whose gradient magnitude reaches `high` seed edges; pixels reaching
/// `low` are kept when 8-connected to a seed. Images narrower or
/// shorter than 3 pixels have no interior and yield an empty map.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = (image.width() as usize, image.height() as usize);
    if w < 3 || h < 3 {
        return GrayImage::new(image.width(), image.height());
    }

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let magnitude: Vec<f32> = gx
        .as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&dx, &dy)| f32::from(dx).hypot(f32::from(dy)))
        .collect();

    let thinned = suppress_non_maxima(&magnitude, gx.as_raw(), gy.as_raw(), w, h);

    let mut out = GrayImage::new(image.width(), image.height());
    hysteresis(&thinned, &mut out, w, h, low, high);
    out
}

/// Keep only pixels that are local maxima along their gradient
/// direction, quantized to 0/45/90/135 degrees. Border pixels are
/// always suppressed.
fn suppress_non_maxima(magnitude: &[f32], gx: &[i16], gy: &[i16], w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0; magnitude.len()];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let mut angle = f32::from(gy[i]).atan2(f32::from(gx[i])).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            let (a, b) = if !(22.5..157.5).contains(&angle) {
                (i - 1, i + 1)
            } else if angle < 67.5 {
                (i + w + 1, i - w - 1)
            } else if angle < 112.5 {
                (i - w, i + w)
            } else {
                (i + w - 1, i - w + 1)
            };
            if magnitude[i] >= magnitude[a] && magnitude[i] >= magnitude[b] {
                out[i] = magnitude[i];
            }
        }
    }
    out
}

/// Depth-first flood from strong pixels through weak ones.
fn hysteresis(strength: &[f32], out: &mut GrayImage, w: usize, h: usize, low: f32, high: f32) {
    let buf: &mut [u8] = out;
    let mut stack = Vec::new();
    for seed in 0..strength.len() {
        if strength[seed] < high || buf[seed] != 0 {
            continue;
        }
        buf[seed] = 255;
        stack.push(seed);
        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if buf[n] == 0 && strength[n] >= low {
                        buf[n] = 255;
                        stack.push(n);
                    }
                }
            }
        }
    }
}
