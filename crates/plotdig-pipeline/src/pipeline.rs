//! The stateful transform pipeline.
//!
//! A [`Pipeline`] owns two image buffers: `original`, the last committed
//! image, and `processed`, the working copy each transform replaces.
//! Both are present or both absent. Alongside them it tracks whether
//! the working copy is an edge map, the cumulative blur kernel, the
//! contour registry, and the contours marked for export.
//!
//! ```rust
//! # use plotdig_pipeline::{Pipeline, PipelineError, SizeName, BlurAmount, BlurKind, EdgeKind};
//! # fn run(png: &[u8]) -> Result<(), PipelineError> {
//! let mut pipeline = Pipeline::new();
//! pipeline.load_from_memory(png)?;
//! pipeline.resize(SizeName::Vga);
//! pipeline.gray();
//! pipeline.blur(BlurKind::Gaussian, BlurAmount::Passes(2))?;
//! pipeline.edges(EdgeKind::Canny);
//! let keys = pipeline.find_contours(true, None)?;
//! # Ok(())
//! # }
//! ```
//!
//! Failed operations leave every field as it was.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::blur::{BlurAmount, BlurKind};
use crate::calibration::AffineMap;
use crate::command::{Command, CommandOutcome};
use crate::contour::{self, Contour, Retrieval};
use crate::edge::{EdgeKind, Thresholds};
use crate::geometry::HitIndex;
use crate::raster::Raster;
use crate::registry::ContourRegistry;
use crate::resize::SizeName;
use crate::types::{ContourKey, Dimensions, PipelineConfig, PipelineError, PixelPoint, Point, Roi};
use crate::{coords, grayscale, load, overlay, resize, simplify};

/// Which buffers [`Pipeline::clear`] resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    /// Drop the image entirely.
    All,
    /// Restore the working copy from the original.
    Processed,
}

impl fmt::Display for ClearScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Processed => f.write_str("processed"),
        }
    }
}

impl FromStr for ClearScope {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "processed" => Ok(Self::Processed),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown clear scope {other:?} (expected all or processed)"
            ))),
        }
    }
}

/// Result of [`Pipeline::resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResizeOutcome {
    /// No image is loaded.
    Empty,
    /// The target is wider than the image; nothing changed.
    Refused {
        /// Size of the image.
        current: Dimensions,
        /// Size the request would have produced.
        target: Dimensions,
    },
    /// The image now has size `to`.
    Resized {
        /// Size before.
        from: Dimensions,
        /// Size after.
        to: Dimensions,
    },
}

/// A non-fatal notice for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// A resize would have enlarged the image and was skipped.
    UpscaleRefused {
        /// Requested size name.
        size: SizeName,
        /// Size of the image.
        current: Dimensions,
        /// Size the request would have produced.
        target: Dimensions,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpscaleRefused {
                size,
                current,
                target,
            } => write!(
                f,
                "resize to {size} skipped: {current} would grow to {target}; only shrinking is supported"
            ),
        }
    }
}

#[derive(Debug, Clone)]
struct Buffers {
    original: Raster,
    processed: Raster,
}

/// Image buffers, transform state and contours for one image.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    buffers: Option<Buffers>,
    is_edgy: bool,
    blurring: u32,
    contours: ContourRegistry,
    export_marks: Vec<ContourKey>,
    advisories: Vec<Advisory>,
}

impl Pipeline {
    /// An empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty pipeline with `config`.
    #[must_use]
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replace the configuration. Cached ROIs keep their padding.
    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }

    // ───────────────────────── Loading ──────────────────────────

    /// Read and decode the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Load`] when the extension is not
    /// supported, the file cannot be read or it does not decode. The
    /// previous image (if any) is kept.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Dimensions, PipelineError> {
        let path = path.as_ref();
        let raster = load::read(path)?;
        log::debug!("loaded {}", path.display());
        Ok(self.load_raster(raster))
    }

    /// Decode an in-memory image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Load`] for empty or undecodable bytes.
    /// The previous image (if any) is kept.
    pub fn load_from_memory(&mut self, bytes: &[u8]) -> Result<Dimensions, PipelineError> {
        let raster = load::decode(bytes)?;
        Ok(self.load_raster(raster))
    }

    /// Install an already decoded raster as both buffers.
    pub fn load_raster(&mut self, raster: Raster) -> Dimensions {
        let dimensions = raster.dimensions();
        log::debug!(
            "new image {dimensions}, {} channel(s)",
            raster.channels()
        );
        self.buffers = Some(Buffers {
            original: raster.clone(),
            processed: raster,
        });
        self.reset_derived();
        dimensions
    }

    fn reset_derived(&mut self) {
        self.is_edgy = false;
        self.blurring = 0;
        self.contours.clear();
        self.export_marks.clear();
    }

    // ───────────────────────── Buffer transforms ──────────────────────────

    /// Reset buffers. Returns false when there was nothing to reset.
    pub fn clear(&mut self, scope: ClearScope) -> bool {
        let Some(buffers) = self.buffers.as_mut() else {
            return false;
        };
        match scope {
            ClearScope::All => self.buffers = None,
            ClearScope::Processed => buffers.processed = buffers.original.clone(),
        }
        self.reset_derived();
        log::debug!("cleared {scope}");
        true
    }

    /// Shrink the image to the named resolution.
    ///
    /// The resized image becomes both `original` and `processed`, and
    /// derived state is reset. A target wider than the image is refused
    /// and recorded as an [`Advisory`].
    pub fn resize(&mut self, size: SizeName) -> ResizeOutcome {
        let Some(buffers) = &self.buffers else {
            return ResizeOutcome::Empty;
        };
        let current = buffers.original.dimensions();
        let target = resize::target_dimensions(current, size);

        if target.width > current.width {
            let advisory = Advisory::UpscaleRefused {
                size,
                current,
                target,
            };
            log::warn!("{advisory}");
            self.advisories.push(advisory);
            return ResizeOutcome::Refused { current, target };
        }

        let resized = resize::resize(&buffers.original, target, self.config.resize_filter);
        log::debug!("resized {current} -> {target} ({size})");
        self.load_raster(resized);
        ResizeOutcome::Resized {
            from: current,
            to: target,
        }
    }

    /// Convert the working copy to luminance. Returns false when it is
    /// already single-channel or no image is loaded.
    pub fn gray(&mut self) -> bool {
        let Some(buffers) = self.buffers.as_mut() else {
            return false;
        };
        let Some(gray) = grayscale::to_gray(&buffers.processed) else {
            return false;
        };
        buffers.processed = gray;
        log::debug!("converted to grayscale");
        true
    }

    /// Smooth the working copy. Returns the kernel size used, or `None`
    /// when no image is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] when `amount` does not
    /// resolve to a kernel size.
    pub fn blur(&mut self, kind: BlurKind, amount: BlurAmount) -> Result<Option<u32>, PipelineError> {
        let Some(buffers) = self.buffers.as_mut() else {
            return Ok(None);
        };
        let kernel = amount.kernel_size(buffers.processed.width(), buffers.processed.height())?;
        buffers.processed = crate::blur::blur(&buffers.processed, kind, kernel);
        self.blurring = self.blurring.saturating_add(kernel);
        self.is_edgy = false;
        log::debug!("blurred with {kernel}x{kernel} kernel, cumulative {}", self.blurring);
        Ok(Some(kernel))
    }

    /// Replace the working copy with its edge map and drop all contours.
    /// Returns the thresholds used, or `None` when no image is loaded.
    pub fn edges(&mut self, kind: EdgeKind) -> Option<Thresholds> {
        let buffers = self.buffers.as_mut()?;
        let (map, thresholds) = crate::edge::detect_edges(&buffers.processed, kind);
        buffers.processed = Raster::Gray(map);
        self.is_edgy = true;
        self.contours.clear();
        self.export_marks.clear();
        log::debug!(
            "edge detection thresholds low={:.1} high={:.1}",
            thresholds.low,
            thresholds.high
        );
        Some(thresholds)
    }

    // ───────────────────────── Contour discovery ──────────────────────────

    /// Discover contours in the working copy.
    ///
    /// Without `parent` the registry is replaced by every border found,
    /// keyed `0..N`. With `parent`, discovery runs inside the parent's
    /// padded ROI: each border found either matches an existing contour
    /// exactly or is added under a fresh key, and becomes a child of
    /// `parent`. Returns the keys discovered.
    ///
    /// `external` keeps only outermost borders.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Empty`] with no image,
    /// [`PipelineError::NotSingleChannel`] when the working copy is
    /// color and [`PipelineError::NotFound`] for an unknown parent.
    pub fn find_contours(
        &mut self,
        external: bool,
        parent: Option<ContourKey>,
    ) -> Result<Vec<ContourKey>, PipelineError> {
        let retrieval = Retrieval::from_external(external);
        match parent {
            None => self.find_global(retrieval),
            Some(parent) => self.find_scoped(retrieval, parent),
        }
    }

    fn find_global(&mut self, retrieval: Retrieval) -> Result<Vec<ContourKey>, PipelineError> {
        let buffers = self.buffers.as_ref().ok_or(PipelineError::Empty)?;
        let gray = buffers
            .processed
            .as_gray()
            .ok_or(PipelineError::NotSingleChannel)?;

        let found = retrieval.trace(gray);
        self.contours = ContourRegistry::from_discovered(found.into_iter().map(Contour::new));
        self.export_marks.clear();
        log::debug!("found {} contour(s) ({retrieval:?})", self.contours.len());
        Ok(self.contours.keys().collect())
    }

    fn find_scoped(
        &mut self,
        retrieval: Retrieval,
        parent: ContourKey,
    ) -> Result<Vec<ContourKey>, PipelineError> {
        let buffers = self.buffers.as_ref().ok_or(PipelineError::Empty)?;
        let gray = buffers
            .processed
            .as_gray()
            .ok_or(PipelineError::NotSingleChannel)?;
        let padding = self.config.roi_padding;
        let contour = self
            .contours
            .get_mut(parent)
            .ok_or(PipelineError::NotFound(parent))?;
        let Some(roi) = contour.roi(padding, buffers.processed.dimensions()) else {
            return Ok(Vec::new());
        };

        let region = image::imageops::crop_imm(gray, roi.x, roi.y, roi.width, roi.height).to_image();
        let found = retrieval.trace(&region);

        let mut index: HashMap<Fingerprint, Vec<ContourKey>> = HashMap::new();
        for (key, existing) in self.contours.iter() {
            if let Some(fp) = Fingerprint::of(existing.points()) {
                index.entry(fp).or_default().push(key);
            }
        }

        let mut discovered = Vec::new();
        let mut added = 0usize;
        for points in found {
            let points: Vec<PixelPoint> = points
                .into_iter()
                .map(|p| PixelPoint::new(p.x + roi.x, p.y + roi.y))
                .collect();
            let Some(fp) = Fingerprint::of(&points) else {
                continue;
            };

            let matched = index.get(&fp).and_then(|candidates| {
                candidates.iter().copied().find(|&k| {
                    self.contours
                        .get(k)
                        .is_some_and(|c| c.points() == points.as_slice())
                })
            });
            let key = match matched {
                Some(k) if k == parent => continue,
                Some(k) => k,
                None => {
                    let k = self.contours.next_key();
                    self.contours.insert(k, Contour::new(points));
                    index.entry(fp).or_default().push(k);
                    added += 1;
                    k
                }
            };
            if let Some(p) = self.contours.get_mut(parent) {
                p.add_child(key);
            }
            if !discovered.contains(&key) {
                discovered.push(key);
            }
        }

        log::debug!(
            "scoped discovery in {parent}: {} child(ren), {added} new",
            discovered.len()
        );
        Ok(discovered)
    }

    // ───────────────────────── Contour editing ──────────────────────────

    /// Replace a contour with the pieces between its corners.
    ///
    /// `epsilon` defaults to the configured split tolerance. The pieces
    /// get contiguous keys above the current maximum; the original key
    /// is removed from the registry, from other contours' children and
    /// from the export list. Returns the new keys in order.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidArgument`] for a negative or non-finite
    /// epsilon, [`PipelineError::NotFound`] for an unknown key.
    pub fn split_contour(
        &mut self,
        key: ContourKey,
        epsilon: Option<f64>,
    ) -> Result<Vec<ContourKey>, PipelineError> {
        let epsilon = epsilon.unwrap_or(self.config.split_epsilon);
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(PipelineError::InvalidArgument(format!(
                "split tolerance must be a non-negative number, got {epsilon}"
            )));
        }
        let contour = self.contours.get(key).ok_or(PipelineError::NotFound(key))?;
        let pieces = simplify::split_at_corners(contour.points(), epsilon, contour.closed());

        let first = self.contours.next_key().0;
        self.contours.remove(key);
        self.export_marks.retain(|&k| k != key);

        let keys: Vec<ContourKey> = pieces
            .into_iter()
            .zip(first..)
            .map(|(piece, k)| {
                let k = ContourKey(k);
                self.contours.insert(k, Contour::new(piece));
                k
            })
            .collect();
        log::debug!("split {key} into {} piece(s)", keys.len());
        Ok(keys)
    }

    /// The padded bounding box of a contour, cached on first request.
    ///
    /// `padding` defaults to the configured ROI padding; once cached the
    /// ROI is returned unchanged whatever `padding` is passed.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Empty`] with no image, [`PipelineError::NotFound`]
    /// for an unknown key.
    pub fn contour_roi(
        &mut self,
        key: ContourKey,
        padding: Option<f64>,
    ) -> Result<Option<Roi>, PipelineError> {
        let dimensions = self.dimensions().ok_or(PipelineError::Empty)?;
        let padding = padding.unwrap_or(self.config.roi_padding);
        let contour = self
            .contours
            .get_mut(key)
            .ok_or(PipelineError::NotFound(key))?;
        Ok(contour.roi(padding, dimensions))
    }

    /// Set or clear a contour's label and user coordinate.
    ///
    /// A non-empty `label` moves the contour to the front of the
    /// registry order; an absent or empty one clears label and
    /// coordinate and moves it to the back. `coordinate` is an `"x,y"`
    /// string, ignored when blank.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Coordinate`] for a malformed coordinate,
    /// [`PipelineError::InvalidArgument`] for a coordinate without a
    /// label and [`PipelineError::NotFound`] for an unknown key.
    pub fn label_contour(
        &mut self,
        key: ContourKey,
        label: Option<&str>,
        coordinate: Option<&str>,
    ) -> Result<(), PipelineError> {
        let label = label.map(str::trim).unwrap_or_default();
        let coordinate = match coordinate.map(str::trim).filter(|c| !c.is_empty()) {
            Some(text) => Some(coords::parse_coordinate(text)?),
            None => None,
        };
        if coordinate.is_some() && label.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "a coordinate can only be attached to a labeled contour".to_owned(),
            ));
        }
        if !self.contours.set_label(key, label.to_owned(), coordinate) {
            return Err(PipelineError::NotFound(key));
        }
        log::debug!("labeled {key} {label:?}");
        Ok(())
    }

    /// Delete a contour.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotFound`] for an unknown key.
    pub fn remove_contour(&mut self, key: ContourKey) -> Result<Contour, PipelineError> {
        let removed = self
            .contours
            .remove(key)
            .ok_or(PipelineError::NotFound(key))?;
        self.export_marks.retain(|&k| k != key);
        Ok(removed)
    }

    /// Delete every contour.
    pub fn clear_contours(&mut self) {
        self.contours.clear();
        self.export_marks.clear();
    }

    /// Append a contour to the export list. Returns false when it was
    /// already marked.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotFound`] for an unknown key.
    pub fn mark_for_export(&mut self, key: ContourKey) -> Result<bool, PipelineError> {
        if !self.contours.contains(key) {
            return Err(PipelineError::NotFound(key));
        }
        if self.export_marks.contains(&key) {
            return Ok(false);
        }
        self.export_marks.push(key);
        Ok(true)
    }

    /// Drop a contour from the export list. Returns false when it was
    /// not marked.
    pub fn unmark(&mut self, key: ContourKey) -> bool {
        let before = self.export_marks.len();
        self.export_marks.retain(|&k| k != key);
        self.export_marks.len() != before
    }

    // ───────────────────────── Calibration and export ──────────────────────────

    /// The affine map fitted to the tick contours.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Calibration`] with fewer than three usable ticks
    /// or collinear ticks.
    pub fn calibration(&self) -> Result<AffineMap, PipelineError> {
        Ok(AffineMap::from_ticks(&self.contours)?)
    }

    /// Every point of every marked contour, in marking order, mapped to
    /// user space.
    ///
    /// # Errors
    ///
    /// As [`calibration`](Self::calibration).
    pub fn export_points(&self) -> Result<Vec<Point>, PipelineError> {
        let map = self.calibration()?;
        let points: Vec<Point> = self
            .export_marks
            .iter()
            .filter_map(|&k| self.contours.get(k))
            .flat_map(Contour::points)
            .map(|&p| map.map(p.into()))
            .collect();
        log::debug!(
            "exporting {} point(s) from {} contour(s)",
            points.len(),
            self.export_marks.len()
        );
        Ok(points)
    }

    // ───────────────────────── Display and queries ──────────────────────────

    /// The image an adapter should show: the working copy when
    /// `show_pipeline` is set, otherwise the original with contours
    /// drawn over it. `None` with no image.
    #[must_use]
    pub fn display_image(&self, show_pipeline: bool) -> Option<Raster> {
        let buffers = self.buffers.as_ref()?;
        if show_pipeline {
            Some(buffers.processed.clone())
        } else {
            self.overlay(None).map(Raster::Rgb)
        }
    }

    /// The original image with contours drawn, `highlight` in green.
    #[must_use]
    pub fn overlay(&self, highlight: Option<ContourKey>) -> Option<RgbImage> {
        let buffers = self.buffers.as_ref()?;
        Some(overlay::render(&buffers.original, &self.contours, highlight))
    }

    /// The contour within the configured hit threshold of `p`.
    #[must_use]
    pub fn contour_at(&self, p: Point) -> Option<ContourKey> {
        HitIndex::build(self.contours.iter()).hit(p, self.config.hit_threshold)
    }

    /// Make sure contours exist, running edge detection (unless the
    /// working copy is already an edge map) and global discovery when
    /// the registry is empty. Returns whether discovery ran.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Empty`] with no image.
    pub fn ensure_contours(&mut self, external: bool) -> Result<bool, PipelineError> {
        if self.buffers.is_none() {
            return Err(PipelineError::Empty);
        }
        if !self.contours.is_empty() {
            return Ok(false);
        }
        if !self.is_edgy {
            self.edges(EdgeKind::default());
        }
        self.find_contours(external, None)?;
        Ok(true)
    }

    /// Run one command.
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns.
    pub fn apply(&mut self, command: &Command) -> Result<CommandOutcome, PipelineError> {
        let changed = |b: bool| {
            if b {
                CommandOutcome::Done
            } else {
                CommandOutcome::Unchanged
            }
        };
        Ok(match command {
            Command::Resize { size } => CommandOutcome::Resized {
                result: self.resize(*size),
            },
            Command::Gray => changed(self.gray()),
            Command::Blur { kind, amount } => self
                .blur(*kind, *amount)?
                .map_or(CommandOutcome::Unchanged, |kernel| CommandOutcome::Blurred { kernel }),
            Command::Edges { kind } => self
                .edges(*kind)
                .map_or(CommandOutcome::Unchanged, |thresholds| CommandOutcome::Edges { thresholds }),
            Command::FindContours { external, parent } => CommandOutcome::Contours {
                keys: self.find_contours(*external, *parent)?,
            },
            Command::SplitContour { key, epsilon } => CommandOutcome::Contours {
                keys: self.split_contour(*key, *epsilon)?,
            },
            Command::LabelContour {
                key,
                label,
                coordinate,
            } => {
                self.label_contour(*key, label.as_deref(), coordinate.as_deref())?;
                CommandOutcome::Done
            }
            Command::RemoveContour { key } => {
                self.remove_contour(*key)?;
                CommandOutcome::Done
            }
            Command::Mark { key } => changed(self.mark_for_export(*key)?),
            Command::Unmark { key } => changed(self.unmark(*key)),
            Command::Clear { scope } => changed(self.clear(*scope)),
        })
    }

    /// Drain pending advisories.
    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }

    /// Pending advisories.
    #[must_use]
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    // ───────────────────────── Accessors ──────────────────────────

    /// Whether no image is loaded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffers.is_none()
    }

    /// The last committed image.
    #[must_use]
    pub fn original(&self) -> Option<&Raster> {
        self.buffers.as_ref().map(|b| &b.original)
    }

    /// The working copy.
    #[must_use]
    pub fn processed(&self) -> Option<&Raster> {
        self.buffers.as_ref().map(|b| &b.processed)
    }

    /// Size of the working copy.
    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.processed().map(Raster::dimensions)
    }

    /// Whether the working copy is an edge map.
    #[must_use]
    pub const fn is_edgy(&self) -> bool {
        self.is_edgy
    }

    /// Sum of the blur kernel sizes applied since the last reset.
    #[must_use]
    pub const fn blurring(&self) -> u32 {
        self.blurring
    }

    /// The contour registry.
    #[must_use]
    pub const fn contours(&self) -> &ContourRegistry {
        &self.contours
    }

    /// Keys marked for export, in marking order.
    #[must_use]
    pub fn export_marks(&self) -> &[ContourKey] {
        &self.export_marks
    }
}

/// Cheap identity of a point sequence used to prune exact comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Fingerprint {
    len: usize,
    lo: PixelPoint,
    hi: PixelPoint,
    digest: u64,
}

impl Fingerprint {
    fn of(points: &[PixelPoint]) -> Option<Self> {
        let (lo, hi) = contour::bounds(points)?;
        let mut hasher = SipHasher13::new();
        points.hash(&mut hasher);
        Some(Self {
            len: points.len(),
            lo,
            hi,
            digest: hasher.finish(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationError, TICK_LABEL};
    use image::{GrayImage, Luma, Rgb};

    fn rgb_with_dark_square(w: u32, h: u32) -> Raster {
        Raster::Rgb(RgbImage::from_fn(w, h, |x, y| {
            if (w / 4..w / 2).contains(&x) && (h / 4..h / 2).contains(&y) {
                Rgb([10, 10, 10])
            } else {
                Rgb([230, 230, 230])
            }
        }))
    }

    /// Binary ring: outer square 5..25 with a hollow 10..20 center.
    fn ring() -> Raster {
        Raster::Gray(GrayImage::from_fn(30, 30, |x, y| {
            let outer = (5..25).contains(&x) && (5..25).contains(&y);
            let inner = (10..20).contains(&x) && (10..20).contains(&y);
            Luma([if outer && !inner { 255 } else { 0 }])
        }))
    }

    fn loaded(raster: Raster) -> Pipeline {
        let mut p = Pipeline::new();
        p.load_raster(raster);
        p
    }

    fn pts(coords: &[(u32, u32)]) -> Vec<PixelPoint> {
        coords.iter().map(|&(x, y)| PixelPoint::new(x, y)).collect()
    }

    fn square(x: u32, y: u32) -> Contour {
        Contour::new(pts(&[(x, y), (x + 2, y), (x + 2, y + 2), (x, y + 2)]))
    }

    #[test]
    fn new_pipeline_is_empty() {
        let p = Pipeline::new();
        assert!(p.is_empty());
        assert!(p.original().is_none());
        assert!(p.display_image(false).is_none());
    }

    #[test]
    fn load_from_memory_fills_both_buffers() {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(RgbImage::new(8, 6))
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let mut p = Pipeline::new();
        assert_eq!(
            p.load_from_memory(bytes.get_ref()).unwrap(),
            Dimensions::new(8, 6)
        );
        assert_eq!(p.original(), p.processed());
    }

    #[test]
    fn failed_load_keeps_previous_image() {
        let mut p = loaded(rgb_with_dark_square(20, 10));
        assert!(matches!(
            p.load_from_memory(&[]),
            Err(PipelineError::Load(crate::types::LoadError::EmptyInput))
        ));
        assert!(matches!(
            p.load("picture.gif"),
            Err(PipelineError::Load(crate::types::LoadError::UnsupportedExtension(_)))
        ));
        assert_eq!(p.dimensions(), Some(Dimensions::new(20, 10)));
    }

    #[test]
    fn resize_shrinks_landscape_and_portrait() {
        let mut p = loaded(rgb_with_dark_square(1000, 800));
        assert_eq!(
            p.resize(SizeName::Vga),
            ResizeOutcome::Resized {
                from: Dimensions::new(1000, 800),
                to: Dimensions::new(640, 512)
            }
        );
        assert_eq!(p.original().unwrap().dimensions(), Dimensions::new(640, 512));
        assert_eq!(p.original(), p.processed());

        let mut p = loaded(Raster::Gray(GrayImage::new(600, 1200)));
        p.resize(SizeName::Vga);
        assert_eq!(p.dimensions(), Some(Dimensions::new(240, 480)));
    }

    #[test]
    fn resize_refuses_upscale_with_advisory() {
        let mut p = loaded(rgb_with_dark_square(640, 480));
        let before = p.processed().cloned();
        let outcome = p.resize(SizeName::Hd);
        assert!(matches!(outcome, ResizeOutcome::Refused { .. }));
        assert_eq!(p.processed().cloned(), before);
        let advisories = p.take_advisories();
        assert_eq!(advisories.len(), 1);
        assert!(advisories[0].to_string().contains("hd"));
        assert!(p.advisories().is_empty());
    }

    #[test]
    fn resize_never_grows_any_dimension() {
        for (w, h) in [(700, 300), (300, 700), (500, 500), (2000, 100), (100, 2000)] {
            for size in SizeName::ALL {
                let mut p = loaded(Raster::Gray(GrayImage::new(w, h)));
                p.resize(size);
                let d = p.dimensions().unwrap();
                assert!(d.width <= w && d.height <= h, "{w}x{h} -> {d} via {size}");
            }
        }
    }

    #[test]
    fn resize_on_empty_is_noop() {
        let mut p = Pipeline::new();
        assert_eq!(p.resize(SizeName::Vga), ResizeOutcome::Empty);
        assert!(p.take_advisories().is_empty());
    }

    #[test]
    fn resize_resets_derived_state() {
        let mut p = loaded(rgb_with_dark_square(1000, 800));
        p.edges(EdgeKind::Canny);
        p.find_contours(false, None).unwrap();
        p.resize(SizeName::Vga);
        assert!(!p.is_edgy());
        assert!(p.contours().is_empty());
        assert_eq!(p.processed().unwrap().channels(), 3);
    }

    #[test]
    fn clear_processed_restores_original() {
        let mut p = loaded(rgb_with_dark_square(40, 40));
        p.gray();
        p.blur(BlurKind::Gaussian, BlurAmount::Passes(2)).unwrap();
        p.edges(EdgeKind::Canny);
        assert!(p.clear(ClearScope::Processed));
        assert_eq!(p.original(), p.processed());
        assert!(!p.is_edgy());
        assert_eq!(p.blurring(), 0);
    }

    #[test]
    fn clear_all_empties() {
        let mut p = loaded(rgb_with_dark_square(40, 40));
        assert!(p.clear(ClearScope::All));
        assert!(p.is_empty());
        assert!(!p.clear(ClearScope::All));
        assert!(!p.clear(ClearScope::Processed));
    }

    #[test]
    fn clear_scope_parses() {
        assert_eq!("ALL".parse::<ClearScope>().unwrap(), ClearScope::All);
        assert_eq!("processed".parse::<ClearScope>().unwrap(), ClearScope::Processed);
        assert!(matches!(
            "everything".parse::<ClearScope>(),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn gray_is_idempotent() {
        let mut p = loaded(rgb_with_dark_square(20, 20));
        assert!(p.gray());
        let once = p.processed().cloned();
        assert!(!p.gray());
        assert_eq!(p.processed().cloned(), once);
        assert_eq!(p.processed().unwrap().channels(), 1);
        assert_eq!(p.original().unwrap().channels(), 3);
    }

    #[test]
    fn blurring_accumulates_and_clears_edgy() {
        let mut p = loaded(rgb_with_dark_square(50, 50));
        p.edges(EdgeKind::Canny);
        assert!(p.is_edgy());

        assert_eq!(p.blur(BlurKind::Gaussian, BlurAmount::Passes(1)).unwrap(), Some(3));
        assert_eq!(p.blurring(), 3);
        assert!(!p.is_edgy());
        assert_eq!(p.blur(BlurKind::Gaussian, BlurAmount::Passes(3)).unwrap(), Some(7));
        assert_eq!(p.blurring(), 10);
        // floor(0.2 * 50) = 10 -> 9
        assert_eq!(p.blur(BlurKind::Gaussian, BlurAmount::Strength(0.2)).unwrap(), Some(9));
        assert_eq!(p.blurring(), 19);
    }

    #[test]
    fn invalid_blur_leaves_state_unchanged() {
        let mut p = loaded(rgb_with_dark_square(50, 50));
        let before = p.processed().cloned();
        assert!(p.blur(BlurKind::Gaussian, BlurAmount::Passes(0)).is_err());
        assert!(p.blur(BlurKind::Gaussian, BlurAmount::Strength(-1.0)).is_err());
        assert!(p.blur(BlurKind::Gaussian, BlurAmount::Strength(1e9)).is_err());
        assert!(p.blur(BlurKind::Gaussian, BlurAmount::Passes(u32::MAX)).is_err());
        assert!(matches!(
            p.apply(&Command::Blur {
                kind: BlurKind::Gaussian,
                amount: BlurAmount::Strength(3.0),
            }),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert_eq!(p.processed().cloned(), before);
        assert_eq!(p.blurring(), 0);
    }

    #[test]
    fn blur_on_empty_is_noop() {
        let mut p = Pipeline::new();
        assert_eq!(p.blur(BlurKind::Gaussian, BlurAmount::Passes(2)).unwrap(), None);
        assert_eq!(p.blurring(), 0);
    }

    #[test]
    fn edges_produce_binary_map_and_drop_contours() {
        let mut p = loaded(rgb_with_dark_square(60, 60));
        p.edges(EdgeKind::Canny).unwrap();
        p.find_contours(false, None).unwrap();
        assert!(!p.contours().is_empty());
        p.mark_for_export(ContourKey(0)).unwrap();

        p.edges(EdgeKind::Canny).unwrap();
        assert!(p.is_edgy());
        assert!(p.contours().is_empty());
        assert!(p.export_marks().is_empty());
        let edges = p.processed().unwrap().as_gray().unwrap();
        assert!(edges.pixels().all(|px| px.0[0] == 0 || px.0[0] == 255));
    }

    #[test]
    fn find_contours_errors() {
        let mut p = Pipeline::new();
        assert!(matches!(p.find_contours(false, None), Err(PipelineError::Empty)));

        let mut p = loaded(rgb_with_dark_square(20, 20));
        assert!(matches!(
            p.find_contours(false, None),
            Err(PipelineError::NotSingleChannel)
        ));

        let mut p = loaded(ring());
        assert!(matches!(
            p.find_contours(false, Some(ContourKey(4))),
            Err(PipelineError::NotFound(ContourKey(4)))
        ));
    }

    #[test]
    fn global_discovery_is_repeatable() {
        let mut p = loaded(ring());
        let keys = p.find_contours(false, None).unwrap();
        assert_eq!(keys, vec![ContourKey(0), ContourKey(1)]);
        let first: Vec<Vec<PixelPoint>> =
            p.contours().iter().map(|(_, c)| c.points().to_vec()).collect();
        p.find_contours(false, None).unwrap();
        let second: Vec<Vec<PixelPoint>> =
            p.contours().iter().map(|(_, c)| c.points().to_vec()).collect();
        assert_eq!(first, second);

        assert_eq!(p.find_contours(true, None).unwrap().len(), 1);
    }

    #[test]
    fn scoped_discovery_links_children_without_duplicates() {
        let mut p = loaded(ring());
        p.find_contours(true, None).unwrap();
        assert_eq!(p.contours().len(), 1);

        let children = p.find_contours(false, Some(ContourKey(0))).unwrap();
        // The outer border matches the parent itself; the hole is new.
        assert_eq!(children, vec![ContourKey(1)]);
        assert_eq!(p.contours().len(), 2);
        assert!(p.contours().get(ContourKey(0)).unwrap().children().contains(&ContourKey(1)));

        let again = p.find_contours(false, Some(ContourKey(0))).unwrap();
        assert_eq!(again, vec![ContourKey(1)]);
        assert_eq!(p.contours().len(), 2);
        assert!(p.contours().get(ContourKey(0)).unwrap().cached_roi().is_some());
    }

    #[test]
    fn split_replaces_contour_with_pieces() {
        let mut p = loaded(Raster::Gray(GrayImage::new(10, 10)));
        let l = pts(&[(0, 0), (0, 1), (0, 2), (0, 3), (1, 3), (2, 3), (3, 3)]);
        let mut other = square(5, 5);
        other.add_child(ContourKey(0));
        p.contours = ContourRegistry::from_discovered([Contour::new(l.clone()), other]);
        p.mark_for_export(ContourKey(0)).unwrap();
        p.mark_for_export(ContourKey(1)).unwrap();

        let keys = p.split_contour(ContourKey(0), Some(0.5)).unwrap();
        assert_eq!(keys, vec![ContourKey(2), ContourKey(3)]);
        assert!(!p.contours().contains(ContourKey(0)));
        assert!(p.contours().get(ContourKey(1)).unwrap().children().is_empty());
        assert_eq!(p.export_marks(), &[ContourKey(1)]);

        let mut rebuilt = p.contours().get(keys[0]).unwrap().points().to_vec();
        rebuilt.extend_from_slice(&p.contours().get(keys[1]).unwrap().points()[1..]);
        assert_eq!(rebuilt, l);
    }

    #[test]
    fn split_errors_leave_registry_untouched() {
        let mut p = loaded(Raster::Gray(GrayImage::new(10, 10)));
        p.contours = ContourRegistry::from_discovered([square(1, 1)]);
        assert!(matches!(
            p.split_contour(ContourKey(0), Some(f64::NAN)),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert!(matches!(
            p.split_contour(ContourKey(5), None),
            Err(PipelineError::NotFound(_))
        ));
        assert_eq!(p.contours().len(), 1);
        assert!(p.contours().contains(ContourKey(0)));
    }

    #[test]
    fn contour_roi_is_cached() {
        let mut p = Pipeline::new();
        assert!(matches!(
            p.contour_roi(ContourKey(0), None),
            Err(PipelineError::Empty)
        ));

        let mut p = loaded(Raster::Gray(GrayImage::new(100, 100)));
        p.contours = ContourRegistry::from_discovered([square(40, 40)]);
        let roi = p.contour_roi(ContourKey(0), Some(0.1)).unwrap().unwrap();
        assert_eq!(roi, Roi { x: 30, y: 30, width: 23, height: 23 });
        assert_eq!(p.contour_roi(ContourKey(0), Some(0.0)).unwrap(), Some(roi));
        assert!(matches!(
            p.contour_roi(ContourKey(1), None),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn labeling_validates_before_mutating() {
        let mut p = loaded(Raster::Gray(GrayImage::new(10, 10)));
        p.contours = ContourRegistry::from_discovered([square(0, 0), square(5, 5)]);

        let err = p.label_contour(ContourKey(1), Some("tick"), Some("abc,1")).unwrap_err();
        assert!(matches!(err, PipelineError::Coordinate(_)));
        assert!(err.is_validation());

        let err = p.label_contour(ContourKey(1), None, Some("1,2")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
        assert!(!p.contours().get(ContourKey(1)).unwrap().is_labeled());

        assert!(matches!(
            p.label_contour(ContourKey(7), Some("x"), None),
            Err(PipelineError::NotFound(_))
        ));

        p.label_contour(ContourKey(1), Some("tick"), Some("1.5^2, 4")).unwrap();
        let keys: Vec<ContourKey> = p.contours().keys().collect();
        assert_eq!(keys, vec![ContourKey(1), ContourKey(0)]);
        assert_eq!(
            p.contours().get(ContourKey(1)).unwrap().coordinate(),
            Some(Point::new(2.25, 4.0))
        );

        p.label_contour(ContourKey(1), Some(""), None).unwrap();
        let keys: Vec<ContourKey> = p.contours().keys().collect();
        assert_eq!(keys, vec![ContourKey(0), ContourKey(1)]);
        assert_eq!(p.contours().get(ContourKey(1)).unwrap().coordinate(), None);
    }

    #[test]
    fn marks_follow_contour_lifetime() {
        let mut p = loaded(Raster::Gray(GrayImage::new(10, 10)));
        p.contours = ContourRegistry::from_discovered([square(0, 0), square(5, 5)]);
        assert!(p.mark_for_export(ContourKey(1)).unwrap());
        assert!(!p.mark_for_export(ContourKey(1)).unwrap());
        assert!(p.mark_for_export(ContourKey(0)).unwrap());
        assert_eq!(p.export_marks(), &[ContourKey(1), ContourKey(0)]);
        assert!(matches!(
            p.mark_for_export(ContourKey(9)),
            Err(PipelineError::NotFound(_))
        ));

        assert!(p.unmark(ContourKey(1)));
        assert!(!p.unmark(ContourKey(1)));
        p.remove_contour(ContourKey(0)).unwrap();
        assert!(p.export_marks().is_empty());
        assert!(p.remove_contour(ContourKey(0)).is_err());

        p.clear_contours();
        assert!(p.contours().is_empty());
    }

    #[test]
    fn export_maps_marked_points_through_ticks() {
        let mut p = loaded(Raster::Gray(GrayImage::new(200, 200)));
        p.contours = ContourRegistry::from_discovered([
            square(0, 100),
            square(100, 100),
            square(0, 0),
            Contour::new(pts(&[(1, 101), (51, 51), (101, 1)])),
        ]);
        assert!(matches!(
            p.export_points(),
            Err(PipelineError::Calibration(CalibrationError::InsufficientTicks { found: 0 }))
        ));

        p.label_contour(ContourKey(0), Some(TICK_LABEL), Some("0,0")).unwrap();
        p.label_contour(ContourKey(1), Some(TICK_LABEL), Some("10,0")).unwrap();
        p.label_contour(ContourKey(2), Some(TICK_LABEL), Some("0,10")).unwrap();
        p.mark_for_export(ContourKey(3)).unwrap();

        let out = p.export_points().unwrap();
        let expected = [Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 10.0)];
        assert_eq!(out.len(), 3);
        for (got, want) in out.iter().zip(expected) {
            assert!(got.distance(want) < 1e-9, "{got:?} != {want:?}");
        }
    }

    #[test]
    fn collinear_ticks_are_singular() {
        let mut p = loaded(Raster::Gray(GrayImage::new(200, 200)));
        p.contours =
            ContourRegistry::from_discovered([square(0, 0), square(50, 50), square(100, 100)]);
        for (k, c) in [(0, "0,0"), (1, "1,1"), (2, "2,0")] {
            p.label_contour(ContourKey(k), Some(TICK_LABEL), Some(c)).unwrap();
        }
        assert!(matches!(
            p.calibration(),
            Err(PipelineError::Calibration(CalibrationError::Singular))
        ));
    }

    #[test]
    fn contour_at_uses_hit_threshold() {
        let mut p = Pipeline::with_config(PipelineConfig {
            hit_threshold: 3.0,
            ..PipelineConfig::default()
        });
        p.load_raster(Raster::Gray(GrayImage::new(100, 100)));
        p.contours = ContourRegistry::from_discovered([Contour::new(pts(&[(10, 10), (90, 10)]))]);
        assert_eq!(p.contour_at(Point::new(50.0, 12.0)), Some(ContourKey(0)));
        assert_eq!(p.contour_at(Point::new(50.0, 20.0)), None);
    }

    #[test]
    fn display_switches_between_processed_and_overlay() {
        let mut p = loaded(rgb_with_dark_square(40, 40));
        p.gray();
        assert_eq!(p.display_image(true).unwrap().channels(), 1);
        let overlay = p.display_image(false).unwrap();
        assert_eq!(overlay.channels(), 3);
        assert_eq!(overlay, Raster::Rgb(p.original().unwrap().to_rgb()));
    }

    #[test]
    fn ensure_contours_runs_edges_once() {
        let mut p = Pipeline::new();
        assert!(matches!(p.ensure_contours(false), Err(PipelineError::Empty)));

        let mut p = loaded(rgb_with_dark_square(80, 60));
        assert!(p.ensure_contours(true).unwrap());
        assert!(p.is_edgy());
        assert!(!p.contours().is_empty());
        assert!(!p.ensure_contours(true).unwrap());
    }

    #[test]
    fn apply_replays_a_script() {
        let mut p = loaded(rgb_with_dark_square(1000, 800));
        let script = [
            Command::Resize { size: SizeName::Vga },
            Command::Gray,
            Command::Gray,
            Command::Blur {
                kind: BlurKind::Gaussian,
                amount: BlurAmount::Passes(1),
            },
            Command::Edges { kind: EdgeKind::Canny },
            Command::FindContours {
                external: true,
                parent: None,
            },
        ];
        let outcomes: Vec<CommandOutcome> =
            script.iter().map(|c| p.apply(c).unwrap()).collect();
        assert_eq!(
            outcomes[0],
            CommandOutcome::Resized {
                result: ResizeOutcome::Resized {
                    from: Dimensions::new(1000, 800),
                    to: Dimensions::new(640, 512)
                }
            }
        );
        assert_eq!(outcomes[1], CommandOutcome::Done);
        assert_eq!(outcomes[2], CommandOutcome::Unchanged);
        assert_eq!(outcomes[3], CommandOutcome::Blurred { kernel: 3 });
        assert!(matches!(outcomes[4], CommandOutcome::Edges { .. }));
        assert!(matches!(
            &outcomes[5],
            CommandOutcome::Contours { keys } if !keys.is_empty()
        ));

        assert!(p.apply(&Command::RemoveContour { key: ContourKey(999) }).is_err());
        assert_eq!(
            p.apply(&Command::Clear { scope: ClearScope::All }).unwrap(),
            CommandOutcome::Done
        );
    }
}
