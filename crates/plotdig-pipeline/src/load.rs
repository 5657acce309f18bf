//! Image loading: extension gate and decoding.
//!
//! The extension check runs before any bytes are read, so an
//! unsupported file is rejected without touching the filesystem.
//! Decoding accepts whatever the `image` crate can decode for the
//! enabled formats.

use std::path::Path;

use crate::raster::Raster;
use crate::types::LoadError;

/// File extensions accepted by [`check_extension`] (compared
/// case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 10] = [
    "png", "jpg", "jpeg", "tiff", "tif", "bmp", "ppm", "pgm", "pbm", "webp",
];

/// Verify that `path` carries a supported image extension.
///
/// # Errors
///
/// Returns [`LoadError::UnsupportedExtension`] when the extension is
/// missing or not in [`SUPPORTED_EXTENSIONS`].
pub fn check_extension(path: &Path) -> Result<(), LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(LoadError::UnsupportedExtension(ext))
    }
}

/// Decode raw image bytes into a [`Raster`].
///
/// # Errors
///
/// Returns [`LoadError::EmptyInput`] if `bytes` is empty.
/// Returns [`LoadError::Decode`] if the image format is unrecognized or
/// the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<Raster, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    Ok(Raster::from(img))
}

/// Read and decode an image file.
///
/// # Errors
///
/// Returns [`LoadError::UnsupportedExtension`] before reading when the
/// extension is not supported, [`LoadError::Io`] when the file cannot be
/// read, and the [`decode`] errors otherwise.
pub fn read(path: &Path) -> Result<Raster, LoadError> {
    check_extension(path)?;
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}
