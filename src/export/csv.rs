//! Row-oriented export: one header row, then one row per record.

use serde::Deserialize;
use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::mem::take;
use std::path::Path;

use super::{create_output, ExportError};
use crate::feed::Record;

const SEP: char = ',';
const LINE_END: &str = "\r\n";

/// A column of the row file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    Link,
    Description,
    Category,
    PublicationDate,
    FormattedDate,
    Guid,
    ExtractedAt,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Title => "titulo",
            Column::Link => "link",
            Column::Description => "descricao",
            Column::Category => "categoria",
            Column::PublicationDate => "data_publicacao",
            Column::FormattedDate => "data_formatada",
            Column::Guid => "guid",
            Column::ExtractedAt => "extraido_em",
        }
    }

    pub fn value(self, record: &Record) -> Cow<'_, str> {
        match self {
            Column::Title => Cow::Borrowed(&record.title),
            Column::Link => Cow::Borrowed(&record.link),
            Column::Description => Cow::Borrowed(&record.description),
            Column::Category => Cow::Borrowed(&record.category),
            Column::PublicationDate => Cow::Borrowed(&record.publication_date),
            Column::FormattedDate => Cow::Borrowed(&record.formatted_date),
            Column::Guid => Cow::Borrowed(&record.guid),
            Column::ExtractedAt => Cow::Owned(record.extracted_at_string()),
        }
    }
}

/// Which columns the row file carries, and in what order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnLayout {
    /// `titulo,data_publicacao,categoria,link,descricao,guid,extraido_em`
    #[default]
    Compact,
    /// `titulo,link,descricao,categoria,data_publicacao,data_formatada,extraido_em,guid`
    Full,
}

impl ColumnLayout {
    pub fn columns(self) -> &'static [Column] {
        match self {
            ColumnLayout::Compact => &[
                Column::Title,
                Column::PublicationDate,
                Column::Category,
                Column::Link,
                Column::Description,
                Column::Guid,
                Column::ExtractedAt,
            ],
            ColumnLayout::Full => &[
                Column::Title,
                Column::Link,
                Column::Description,
                Column::Category,
                Column::PublicationDate,
                Column::FormattedDate,
                Column::ExtractedAt,
                Column::Guid,
            ],
        }
    }

    pub fn headers(self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.header()).collect()
    }
}

// ============================================================================
// Writing
// ============================================================================

fn needs_quotes(cell: &str) -> bool {
    cell.contains(SEP) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
}

/// Writes one row; cells holding the separator, a quote or a line break are
/// quoted with inner quotes doubled.
pub fn write_row<W: Write, S: AsRef<str>>(w: &mut W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{SEP}")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(LINE_END.as_bytes())
}

/// Writes the header and every record in `layout` order.
pub fn write_records<W: Write>(w: &mut W, records: &[Record], layout: ColumnLayout) -> io::Result<()> {
    write_row(w, &layout.headers())?;
    for record in records {
        let row: Vec<Cow<'_, str>> = layout.columns().iter().map(|c| c.value(record)).collect();
        write_row(w, &row)?;
    }
    Ok(())
}

/// Writes `records` to `path`, replacing whatever was there.
///
/// An empty slice still produces the header row.
pub fn to_row_format(records: &[Record], path: &Path, layout: ColumnLayout) -> Result<(), ExportError> {
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = create_output(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write_records(&mut out, records, layout).map_err(io_err)?;
    out.flush().map_err(io_err)?;

    tracing::info!(path = %path.display(), rows = records.len(), ?layout, "Wrote CSV export");
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

/// Quote-aware row parser; accepts CRLF and LF line ends.
///
/// Blank lines are skipped. An unterminated quote runs to end of input.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            c if c == SEP && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Reads a row file back as `(header, data rows)`.
pub fn read_rows(path: &Path) -> io::Result<(Vec<String>, Vec<Vec<String>>)> {
    let text = std::fs::read_to_string(path)?;
    let mut rows = parse_rows(&text);
    if rows.is_empty() {
        return Ok((Vec::new(), rows));
    }
    let header = rows.remove(0);
    Ok((header, rows))
}
