//! Export and console reporting, the last pipeline stage.
//!
//! - [`csv`] - row file with a fixed header and per-layout column order
//! - [`json`] - the full record list as a JSON array
//! - [`report`] - preview, category breakdown and checks on written files
//!
//! Both exporters truncate and rewrite their destination on every run.

pub mod csv;
pub mod json;
pub mod report;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use self::csv::{read_rows, to_row_format, ColumnLayout};
pub use self::json::to_structured_format;

/// Errors that can occur while writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize records: {0}")]
    Json(#[from] serde_json::Error),
}

/// Creates (or truncates) `path`, making its parent directory if needed.
fn create_output(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    File::create(path)
}
