//! Human-readable console output.
//!
//! Nothing here is a stable format. Every function writes to a caller-supplied
//! [`Write`] so the binary can use stdout and tests can use a buffer. Feed text
//! is passed through [`console_line`] first since it comes from a remote server.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::csv::read_rows;
use crate::feed::Record;
use crate::util::{console_line, truncate_to_width};

const RULE_WIDTH: usize = 80;

fn rule<W: Write>(out: &mut W, ch: char) -> io::Result<()> {
    writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH))
}

fn banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    rule(out, '=')?;
    writeln!(out, "{title}")?;
    rule(out, '=')
}

// ============================================================================
// Record preview
// ============================================================================

/// Prints the first `limit` records with their description cut to
/// `description_width` columns.
pub fn preview<W: Write>(
    out: &mut W,
    records: &[Record],
    limit: usize,
    description_width: usize,
) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No records to preview.");
    }

    let shown = limit.min(records.len());
    banner(out, &format!("LATEST ITEMS (showing {shown} of {})", records.len()))?;

    for (i, record) in records.iter().take(limit).enumerate() {
        let description = console_line(&record.description);
        writeln!(out)?;
        writeln!(out, "{}. {}", i + 1, console_line(&record.title))?;
        writeln!(out, "   Date: {}", console_line(&record.formatted_date))?;
        writeln!(out, "   Category: {}", console_line(&record.category))?;
        writeln!(out, "   Link: {}", console_line(&record.link))?;
        writeln!(
            out,
            "   Description: {}",
            truncate_to_width(&description, description_width)
        )?;
        rule(out, '-')?;
    }
    Ok(())
}

// ============================================================================
// Category breakdown
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
    /// Share of all records, 0.0 to 100.0.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub total: usize,
    /// Most frequent first; equal counts keep first-seen order.
    pub categories: Vec<CategoryCount>,
}

pub fn category_stats(records: &[Record]) -> CategoryStats {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for record in records {
        match index.get(record.category.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(&record.category, counts.len());
                counts.push((&record.category, 1));
            }
        }
    }

    // Stable sort keeps ties in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total = records.len();
    CategoryStats {
        total,
        categories: counts
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
                percent: count as f64 * 100.0 / total as f64,
            })
            .collect(),
    }
}

/// Prints the totals and the `top_n` most frequent categories.
pub fn render_category_report<W: Write>(
    out: &mut W,
    stats: &CategoryStats,
    top_n: usize,
) -> io::Result<()> {
    banner(out, "RUN REPORT")?;
    writeln!(out, "Records processed: {}", stats.total)?;
    writeln!(out, "Distinct categories: {}", stats.categories.len())?;

    if stats.categories.is_empty() || top_n == 0 {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Top {} categories:", top_n.min(stats.categories.len()))?;
    for (i, entry) in stats.categories.iter().take(top_n).enumerate() {
        writeln!(
            out,
            "   {}. {}: {} ({:.1}%)",
            i + 1,
            console_line(&entry.category),
            entry.count,
            entry.percent
        )?;
    }
    Ok(())
}

// ============================================================================
// Output file checks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// `None` when the file does not exist.
    pub size: Option<u64>,
    /// Physical line count including the header; only computed for `.csv` files.
    pub lines: Option<usize>,
}

pub fn verify_outputs(paths: &[&Path]) -> Vec<FileReport> {
    paths
        .iter()
        .map(|path| {
            let size = std::fs::metadata(path)
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len());
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            let lines = if size.is_some() && is_csv {
                std::fs::read_to_string(path)
                    .ok()
                    .map(|text| text.lines().count())
            } else {
                None
            };
            FileReport {
                path: path.to_path_buf(),
                size,
                lines,
            }
        })
        .collect()
}

pub fn render_file_report<W: Write>(out: &mut W, reports: &[FileReport]) -> io::Result<()> {
    banner(out, "OUTPUT FILES")?;
    for report in reports {
        match report.size {
            Some(size) => {
                writeln!(out, "ok   {}", report.path.display())?;
                writeln!(out, "     size: {size} bytes")?;
                if let Some(lines) = report.lines {
                    writeln!(out, "     lines: {lines} (header included)")?;
                }
            }
            None => writeln!(out, "miss {} (not found)", report.path.display())?,
        }
    }
    Ok(())
}

// ============================================================================
// CSV read-back preview
// ============================================================================

/// Reads the written row file back and prints its header and first `rows`
/// data rows, each cell cut to `cell_width` columns.
pub fn csv_preview<W: Write>(
    out: &mut W,
    path: &Path,
    rows: usize,
    cell_width: usize,
) -> io::Result<()> {
    let (header, data) = read_rows(path)?;

    banner(out, &format!("CSV PREVIEW (first {rows} rows)"))?;
    writeln!(out, "HEADER:")?;
    writeln!(out, "{}", header.join(" | "))?;
    rule(out, '-')?;

    for (i, row) in data.iter().take(rows).enumerate() {
        writeln!(out, "Row {}:", i + 1)?;
        for (j, cell) in row.iter().enumerate() {
            let name = header.get(j).map(String::as_str).unwrap_or("?");
            writeln!(
                out,
                "  {}. {name}: {}",
                j + 1,
                truncate_to_width(&console_line(cell), cell_width)
            )?;
        }
        writeln!(out, "{}", "-".repeat(40))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{to_row_format, ColumnLayout};
    use crate::feed::{extract_at, FeedItem, ItemField};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(title: &str, category: Option<&str>, description: &str) -> Record {
        let at = NaiveDate::from_ymd_opt(2025, 8, 8)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut item = FeedItem::new()
            .with(ItemField::Title, title)
            .with(ItemField::Description, description);
        if let Some(category) = category {
            item.set(ItemField::Category, category);
        }
        extract_at(&item, at)
    }

    fn to_string(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_preview_empty() {
        let text = to_string(|out| preview(out, &[], 5, 150));
        assert_eq!(text, "No records to preview.\n");
    }

    #[test]
    fn test_preview_respects_limit_and_truncates() {
        let long = "palavra ".repeat(40);
        let records: Vec<_> = (0..7)
            .map(|i| record(&format!("Notícia {i}"), Some("Brasil"), &long))
            .collect();

        let text = to_string(|out| preview(out, &records, 3, 20));
        assert!(text.contains("showing 3 of 7"));
        assert!(text.contains("1. Notícia 0"));
        assert!(text.contains("3. Notícia 2"));
        assert!(!text.contains("Notícia 3"));
        assert!(text.contains("   Description: palavra palavra p...\n"));
    }

    #[test]
    fn test_preview_sanitizes_remote_text() {
        let records = vec![record("\x1b[31mRed\x1b[0m\ntitle", None, "ok")];
        let text = to_string(|out| preview(out, &records, 5, 150));
        assert!(text.contains("1. Red title\n"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_category_stats_orders_by_count_then_first_seen() {
        let records = vec![
            record("a", Some("Política"), ""),
            record("b", None, ""),
            record("c", Some("Economia"), ""),
            record("d", Some("Economia"), ""),
            record("e", Some("Política"), ""),
            record("f", Some("Saúde"), ""),
        ];
        let stats = category_stats(&records);
        assert_eq!(stats.total, 6);
        let order: Vec<_> = stats
            .categories
            .iter()
            .map(|c| (c.category.as_str(), c.count))
            .collect();
        assert_eq!(
            order,
            vec![("Política", 2), ("Economia", 2), ("N/A", 1), ("Saúde", 1)]
        );
        assert!((stats.categories[0].percent - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_category_report_top_n() {
        let records = vec![
            record("a", Some("X"), ""),
            record("b", Some("X"), ""),
            record("c", Some("Y"), ""),
            record("d", Some("Z"), ""),
        ];
        let text = to_string(|out| render_category_report(out, &category_stats(&records), 2));
        assert!(text.contains("Records processed: 4"));
        assert!(text.contains("Distinct categories: 3"));
        assert!(text.contains("   1. X: 2 (50.0%)"));
        assert!(text.contains("   2. Y: 1 (25.0%)"));
        assert!(!text.contains("Z:"));
    }

    #[test]
    fn test_category_stats_empty() {
        let stats = category_stats(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.categories.is_empty());
        let text = to_string(|out| render_category_report(out, &stats, 3));
        assert!(text.contains("Records processed: 0"));
        assert!(!text.contains("Top"));
    }

    #[test]
    fn test_verify_outputs_and_csv_preview() {
        let dir = std::env::temp_dir().join("feedscrape_report_test_outputs");
        std::fs::create_dir_all(&dir).unwrap();
        let csv = dir.join("noticias.csv");
        let missing = dir.join("missing.json");

        let records = vec![
            record("Primeira", Some("Brasil"), "x".repeat(80).as_str()),
            record("Segunda", None, "curta"),
        ];
        to_row_format(&records, &csv, ColumnLayout::Compact).unwrap();

        let reports = verify_outputs(&[csv.as_path(), missing.as_path()]);
        assert_eq!(reports[0].lines, Some(3));
        assert!(reports[0].size.unwrap() > 0);
        assert_eq!(reports[1].size, None);
        assert_eq!(reports[1].lines, None);

        let text = to_string(|out| render_file_report(out, &reports));
        assert!(text.contains("lines: 3 (header included)"));
        assert!(text.contains("missing.json (not found)"));

        let text = to_string(|out| csv_preview(out, &csv, 1, 50));
        assert!(text.contains("titulo | data_publicacao | categoria | link | descricao | guid | extraido_em"));
        assert!(text.contains("  1. titulo: Primeira"));
        assert!(text.contains(&format!("  5. descricao: {}...", "x".repeat(47))));
        assert!(!text.contains("Segunda"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
