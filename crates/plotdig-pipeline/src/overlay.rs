//! The "original with contours" view: an RGB copy of the committed
//! image with every contour drawn on top.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::raster::Raster;
use crate::registry::ContourRegistry;
use crate::types::{ContourKey, PixelPoint};

/// Stroke color for ordinary contours.
pub const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Stroke color for the highlighted contour.
pub const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw `registry` over `base`.
///
/// Contours are stroked in iteration order; the `highlight` contour is
/// drawn last so it stays visible where contours overlap. Closed
/// contours get their closing segment.
#[must_use = "returns the rendered overlay"]
pub fn render(base: &Raster, registry: &ContourRegistry, highlight: Option<ContourKey>) -> RgbImage {
    let mut canvas = base.to_rgb();
    for (key, contour) in registry.iter() {
        if Some(key) != highlight {
            stroke(&mut canvas, contour.points(), contour.closed(), CONTOUR_COLOR);
        }
    }
    if let Some(contour) = highlight.and_then(|k| registry.get(k)) {
        stroke(&mut canvas, contour.points(), contour.closed(), HIGHLIGHT_COLOR);
    }
    canvas
}

#[allow(clippy::cast_precision_loss)]
const fn to_f32(p: PixelPoint) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

fn stroke(canvas: &mut RgbImage, points: &[PixelPoint], closed: bool, color: Rgb<u8>) {
    for pair in points.windows(2) {
        draw_line_segment_mut(canvas, to_f32(pair[0]), to_f32(pair[1]), color);
    }
    if closed
        && points.len() > 2
        && let (Some(&first), Some(&last)) = (points.first(), points.last())
    {
        draw_line_segment_mut(canvas, to_f32(last), to_f32(first), color);
    }
}
