//! plotdig-pipeline: image transforms and contour registry for
//! digitizing plotted data.
//!
//! A [`Pipeline`] holds one image and applies classical transforms to
//! a working copy:
//! resize -> grayscale -> blur -> edge detection -> contour discovery.
//! Discovered contours live in a [`ContourRegistry`] where they can be
//! split at corners, labeled, and tied to user-space coordinates. Ticks
//! (contours labeled `"tick"` with a coordinate) calibrate an affine
//! map from pixels to data space, and contours marked for export are
//! mapped through it.
//!
//! The crate does no I/O beyond [`Pipeline::load`]; everything else
//! operates on in-memory buffers. Display, interaction and file output
//! belong to the adapter (`plotdig` CLI, `plotdig-export`).

pub mod blur;
pub mod calibration;
pub mod canny;
pub mod command;
pub mod contour;
pub mod coords;
pub mod edge;
pub mod geometry;
pub mod grayscale;
pub mod load;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod registry;
pub mod resize;
pub mod simplify;
pub mod types;

pub use blur::{BlurAmount, BlurKind};
pub use calibration::{AffineMap, CalibrationError, TICK_LABEL};
pub use command::{Command, CommandOutcome};
pub use contour::{Contour, Retrieval};
pub use coords::{CoordinateError, parse_coordinate};
pub use edge::{EdgeKind, Thresholds};
pub use geometry::HitIndex;
pub use pipeline::{Advisory, ClearScope, Pipeline, ResizeOutcome};
pub use raster::Raster;
pub use registry::ContourRegistry;
pub use resize::{ResizeFilter, SizeName};
pub use types::{
    ContourKey, Dimensions, GrayImage, LoadError, PipelineConfig, PipelineError, PixelPoint, Point,
    RgbImage, Roi,
};
