//! CSV export of user-space points.
//!
//! One header row `x,y`, then one row per point in export order.
//! Values use Rust's shortest round-trip `f64` formatting.

use std::path::{Path, PathBuf};

use csv::Writer;

use plotdig_pipeline::Point;

/// File extension appended to export targets.
pub const EXTENSION: &str = "csv";

/// Errors from CSV export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The CSV writer failed.
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the file failed.
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),

    /// The target exists and overwriting was not confirmed.
    #[error("{} already exists; confirm overwrite to replace it", .0.display())]
    Exists(PathBuf),
}

/// Serialize `points` as CSV text.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if a record cannot be written.
pub fn to_csv(points: &[Point]) -> Result<String, ExportError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["x", "y"])?;
    for p in points {
        writer.write_record([p.x.to_string(), p.y.to_string()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// `path` with `.csv` appended unless it already ends in `.csv`
/// (any case).
#[must_use]
pub fn csv_path(path: &Path) -> PathBuf {
    let has_extension = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION));
    if has_extension {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(EXTENSION);
        PathBuf::from(name)
    }
}

/// Write `points` to `path` (with `.csv` appended if missing).
///
/// Returns the path actually written.
///
/// # Errors
///
/// [`ExportError::Exists`] when the target exists and `overwrite` is
/// false; [`ExportError::Csv`] or [`ExportError::Io`] when writing fails.
pub fn write_csv(path: &Path, points: &[Point], overwrite: bool) -> Result<PathBuf, ExportError> {
    let target = csv_path(path);
    if !overwrite && target.exists() {
        return Err(ExportError::Exists(target));
    }
    let text = to_csv(points)?;
    std::fs::write(&target, text)?;
    log::info!("wrote {} point(s) to {}", points.len(), target.display());
    Ok(target)
}
