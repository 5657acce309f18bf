//! Contours: discovery from a binary edge map and the labeled contour
//! entity the registry stores.
//!
//! Discovery uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]. [`Retrieval`] selects
//! whether only outermost borders or the full nesting hierarchy is
//! returned.

use std::collections::BTreeSet;

use geo::Centroid;
use image::GrayImage;
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::types::{ContourKey, Dimensions, PixelPoint, Point, Roi};

/// Which borders contour discovery returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retrieval {
    /// Only outer borders that are not nested inside another border.
    External,
    /// Every border, outer and hole, at every nesting depth.
    #[default]
    Tree,
}

impl Retrieval {
    /// `External` when `external` is true, `Tree` otherwise.
    #[must_use]
    pub const fn from_external(external: bool) -> Self {
        if external { Self::External } else { Self::Tree }
    }

    /// Trace borders in `edges` (non-zero pixels are foreground).
    ///
    /// Borders with fewer than 2 points are dropped: they have no
    /// segment to draw, hit or split. Order follows the raster scan
    /// order of border following, so repeated calls on the same map
    /// return identical sequences.
    #[must_use]
    pub fn trace(self, edges: &GrayImage) -> Vec<Vec<PixelPoint>> {
        let contours: Vec<imageproc::contours::Contour<u32>> =
            imageproc::contours::find_contours(edges);

        contours
            .into_iter()
            .filter(|c| match self {
                Self::External => c.border_type == BorderType::Outer && c.parent.is_none(),
                Self::Tree => true,
            })
            .filter(|c| c.points.len() >= 2)
            .map(|c| {
                c.points
                    .into_iter()
                    .map(|p| PixelPoint::new(p.x, p.y))
                    .collect()
            })
            .collect()
    }
}

/// A discovered polyline with user annotations.
///
/// `label` is free-form; [`TICK_LABEL`](crate::calibration::TICK_LABEL)
/// marks calibration ticks. `coordinate` is only ever set while the
/// contour is labeled. The ROI is cached on first use and dropped
/// whenever the points are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    points: Vec<PixelPoint>,
    label: String,
    coordinate: Option<Point>,
    closed: bool,
    #[serde(skip)]
    roi: Option<Roi>,
    children: BTreeSet<ContourKey>,
}

impl Contour {
    /// A fresh, unlabeled, open contour.
    #[must_use]
    pub const fn new(points: Vec<PixelPoint>) -> Self {
        Self {
            points,
            label: String::new(),
            coordinate: None,
            closed: false,
            roi: None,
            children: BTreeSet::new(),
        }
    }

    /// The ordered point sequence.
    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.points
    }

    /// Replace the point sequence, invalidating the cached ROI.
    pub fn set_points(&mut self, points: Vec<PixelPoint>) {
        self.points = points;
        self.roi = None;
    }

    /// The label, empty when unlabeled.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether a non-empty label is set.
    #[must_use]
    pub fn is_labeled(&self) -> bool {
        !self.label.is_empty()
    }

    /// The user-space coordinate attached with the label, if any.
    #[must_use]
    pub const fn coordinate(&self) -> Option<Point> {
        self.coordinate
    }

    /// Set or clear the label. Clearing the label also clears the
    /// coordinate. Reordering is the registry's job.
    pub(crate) fn set_label(&mut self, label: String, coordinate: Option<Point>) {
        if label.is_empty() {
            self.label.clear();
            self.coordinate = None;
        } else {
            self.label = label;
            self.coordinate = coordinate;
        }
    }

    /// Whether the contour is treated as a closed polygon when split.
    #[must_use]
    pub const fn closed(&self) -> bool {
        self.closed
    }

    /// Mark the contour closed or open.
    pub const fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
    }

    /// Keys discovered inside this contour's region.
    #[must_use]
    pub const fn children(&self) -> &BTreeSet<ContourKey> {
        &self.children
    }

    pub(crate) fn add_child(&mut self, key: ContourKey) {
        self.children.insert(key);
    }

    pub(crate) fn remove_child(&mut self, key: ContourKey) {
        self.children.remove(&key);
    }

    /// The cached ROI, if it has been computed.
    #[must_use]
    pub const fn cached_roi(&self) -> Option<Roi> {
        self.roi
    }

    /// The padded ROI, computed on first call and cached afterwards.
    ///
    /// The bounding box grows by `round(padding * width)` columns and
    /// `round(padding * height)` rows on each side and is clamped to the
    /// image. Later calls return the cached value regardless of
    /// `padding`. Returns `None` for a contour with no points.
    pub fn roi(&mut self, padding: f64, image: Dimensions) -> Option<Roi> {
        if self.roi.is_none() {
            self.roi = padded_bounds(&self.points, padding, image);
        }
        self.roi
    }

    /// Inclusive `(min, max)` corners of the points.
    #[must_use]
    pub fn bounds(&self) -> Option<(PixelPoint, PixelPoint)> {
        bounds(&self.points)
    }

    /// Mean position of the points.
    #[must_use]
    pub fn centroid(&self) -> Option<Point> {
        let multi: geo::MultiPoint<f64> = self
            .points
            .iter()
            .map(|p| geo::Point::new(f64::from(p.x), f64::from(p.y)))
            .collect();
        multi.centroid().map(|c| Point::new(c.x(), c.y()))
    }
}

/// Inclusive bounding corners of a point set.
#[must_use]
pub fn bounds(points: &[PixelPoint]) -> Option<(PixelPoint, PixelPoint)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(lo, hi), p| {
        (
            PixelPoint::new(lo.x.min(p.x), lo.y.min(p.y)),
            PixelPoint::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    }))
}

fn padded_bounds(points: &[PixelPoint], padding: f64, image: Dimensions) -> Option<Roi> {
    let (lo, hi) = bounds(points)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pad = |extent: u32| (padding.max(0.0) * f64::from(extent)).round() as u32;
    let (pad_x, pad_y) = (pad(image.width), pad(image.height));

    let x0 = lo.x.saturating_sub(pad_x);
    let y0 = lo.y.saturating_sub(pad_y);
    let x1 = hi.x.saturating_add(1).saturating_add(pad_x).min(image.width);
    let y1 = hi.y.saturating_add(1).saturating_add(pad_y).min(image.height);

    Some(Roi {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    })
}
