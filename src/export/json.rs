//! Structured export: the record list as a pretty-printed JSON array.

use std::io::{BufWriter, Write};
use std::path::Path;

use super::{create_output, ExportError};
use crate::feed::Record;

/// Serializes `records` into `w` with two-space indentation.
///
/// Non-ASCII text is written as-is, not `\u` escaped.
pub fn write_json<W: Write>(w: &mut W, records: &[Record]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut *w, records)?;
    w.write_all(b"\n").map_err(serde_json::Error::io)?;
    Ok(())
}

/// Writes `records` to `path` as JSON, replacing whatever was there.
pub fn to_structured_format(records: &[Record], path: &Path) -> Result<(), ExportError> {
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = create_output(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write_json(&mut out, records).map_err(|e| match e {
        ExportError::Json(e) if e.is_io() => io_err(e.into()),
        other => other,
    })?;
    out.flush().map_err(io_err)?;

    tracing::info!(path = %path.display(), records = records.len(), "Wrote JSON export");
    Ok(())
}
