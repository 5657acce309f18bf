//! plotdig-export: coordinate serializers.
//!
//! Turns calibrated points into CSV. [`to_csv`] is pure and returns a
//! `String`; [`write_csv`] is the one file-writing primitive, adding the
//! `.csv` suffix and refusing to overwrite unless asked.

pub mod csv;

pub use self::csv::{ExportError, csv_path, to_csv, write_csv};
