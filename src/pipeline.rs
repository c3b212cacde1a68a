//! The fetch → parse → extract → export pipeline.
//!
//! Each stage consumes the full output of the previous one. A failing stage
//! ends the run; nothing after it executes, so a feed that does not parse
//! never touches the export files.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::export::report::{
    category_stats, csv_preview, preview, render_category_report, render_file_report,
    verify_outputs,
};
use crate::export::{to_row_format, to_structured_format, ExportError};
use crate::feed::{build_client, extract_all, fetch, parse, FetchError, ParseError, Record};

// ============================================================================
// Error Types
// ============================================================================

/// The pipeline state a run was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Parsing,
    Exporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Exporting => "exporting",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to parse feed: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to export records: {0}")]
    Export(#[from] ExportError),

    #[error("Failed to write console output: {0}")]
    Console(#[from] io::Error),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Fetch(_) => Stage::Fetching,
            PipelineError::Parse(_) => Stage::Parsing,
            PipelineError::Export(_) | PipelineError::Console(_) => Stage::Exporting,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// `<item>` elements found in the document.
    pub items: usize,
    pub records: Vec<Record>,
    /// Export files written, in write order.
    pub files: Vec<PathBuf>,
}

/// Counters for a finished [`Pipeline::monitor`] loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub runs: usize,
    pub failures: usize,
}

pub struct Pipeline {
    config: Config,
    client: reqwest::Client,
}

impl Pipeline {
    /// Builds the HTTP client from `config`. The config is used as given;
    /// validate it first.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let client = build_client(&config.user_agent, config.request_timeout())?;
        Ok(Self { config, client })
    }

    /// Runs every stage once, writing status lines, the preview and the
    /// reports to `out`.
    pub async fn run_once<W: Write>(&self, out: &mut W) -> Result<RunSummary, PipelineError> {
        self.run(out, self.config.preview.enabled).await
    }

    async fn run<W: Write>(
        &self,
        out: &mut W,
        show_preview: bool,
    ) -> Result<RunSummary, PipelineError> {
        let config = &self.config;
        let url = config.source_url.as_str();

        writeln!(out, "Fetching {url}")?;
        tracing::info!(url = %url, "Fetching feed");
        let raw = fetch(&self.client, url, config.request_timeout()).await?;

        let items = parse(&raw)?;
        tracing::info!(items = items.len(), "Parsed feed");

        let records = extract_all(&items);
        writeln!(out, "Found {} items", items.len())?;

        if show_preview {
            preview(
                out,
                &records,
                config.preview.limit,
                config.preview.description_width,
            )?;
        }

        let mut files = Vec::new();
        let output = &config.output;
        if output.write_csv {
            to_row_format(&records, &output.csv_path, output.layout)?;
            writeln!(out, "CSV saved: {}", output.csv_path.display())?;
            files.push(output.csv_path.clone());
        }
        if output.write_json {
            to_structured_format(&records, &output.json_path)?;
            writeln!(out, "JSON saved: {}", output.json_path.display())?;
            files.push(output.json_path.clone());
        }

        if config.report.enabled {
            self.report(out, &records, &files)?;
        }

        Ok(RunSummary {
            items: items.len(),
            records,
            files,
        })
    }

    fn report<W: Write>(&self, out: &mut W, records: &[Record], files: &[PathBuf]) -> io::Result<()> {
        let report = &self.config.report;

        writeln!(out)?;
        render_category_report(out, &category_stats(records), report.top_categories)?;

        if files.is_empty() {
            return Ok(());
        }
        writeln!(out)?;
        let paths: Vec<_> = files.iter().map(PathBuf::as_path).collect();
        render_file_report(out, &verify_outputs(&paths))?;

        if self.config.output.write_csv && report.csv_preview_rows > 0 {
            writeln!(out)?;
            csv_preview(
                out,
                &self.config.output.csv_path,
                report.csv_preview_rows,
                report.csv_cell_width,
            )?;
        }
        Ok(())
    }

    /// Repeats the pipeline until `cancel` fires.
    ///
    /// The preview is skipped. A successful run is followed by the monitor
    /// interval, a failed one by the cooldown. Cancellation is observed
    /// between runs and during the wait; a run already in progress finishes.
    /// Console write failures are logged and never stop the loop.
    pub async fn monitor<W: Write>(&self, cancel: CancellationToken, out: &mut W) -> MonitorSummary {
        let monitor = &self.config.monitor;
        let mut summary = MonitorSummary::default();

        status(
            out,
            format_args!(
                "Monitoring {} every {} minute(s). Press Ctrl+C to stop.",
                self.config.source_url, monitor.interval_minutes
            ),
        );

        while !cancel.is_cancelled() {
            summary.runs += 1;
            status(
                out,
                format_args!(
                    "\nRun #{} at {}",
                    summary.runs,
                    Local::now().format("%d/%m/%Y %H:%M:%S")
                ),
            );

            let wait = match self.run(out, false).await {
                Ok(run) => {
                    status(
                        out,
                        format_args!(
                            "Run #{} done: {} records, {} file(s) written",
                            summary.runs,
                            run.records.len(),
                            run.files.len()
                        ),
                    );
                    monitor.interval()
                }
                Err(e) => {
                    summary.failures += 1;
                    tracing::error!(error = %e, stage = %e.stage(), run = summary.runs, "Monitor run failed");
                    status(
                        out,
                        format_args!(
                            "Run #{} failed while {}: {e}. Retrying in {}s",
                            summary.runs,
                            e.stage(),
                            monitor.cooldown_secs
                        ),
                    );
                    monitor.cooldown()
                }
            };

            if !wait_or_cancel(&cancel, wait).await {
                break;
            }
        }

        tracing::info!(runs = summary.runs, failures = summary.failures, "Monitor stopped");
        status(
            out,
            format_args!("Monitoring stopped after {} run(s).", summary.runs),
        );
        summary
    }
}

/// Writes one monitor status line; a failed write is logged, not returned.
fn status<W: Write>(out: &mut W, line: std::fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{line}") {
        tracing::warn!(error = %e, "Failed to write monitor status line");
    }
}

/// Returns `false` if cancelled before `wait` elapsed.
async fn wait_or_cancel(cancel: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!("Received a cancellation signal; exiting");
            false
        }
        _ = tokio::time::sleep(wait) => true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ColumnLayout;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>G1</title>
<item><title>Primeira</title><link>https://g1.globo.com/a</link><category>Política</category></item>
<item><title>Segunda</title><pubDate>Wed, 08 Aug 2025 10:30:00 -0300</pubDate></item>
</channel></rss>"#;

    fn test_config(test: &str, url: String) -> (PathBuf, Config) {
        let dir = std::env::temp_dir().join(format!("feedscrape_pipeline_test_{test}"));
        std::fs::remove_dir_all(&dir).ok();
        let mut config = Config::default();
        config.source_url = url;
        config.request_timeout_secs = 5;
        config.output.csv_path = dir.join("noticias.csv");
        config.output.json_path = dir.join("noticias.json");
        (dir, config)
    }

    async fn serve(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_run_once_writes_both_files() {
        let server = serve(FEED).await;
        let (dir, config) = test_config("run_once", format!("{}/rss", server.uri()));
        let pipeline = Pipeline::new(config).unwrap();

        let mut out = Vec::new();
        let summary = pipeline.run_once(&mut out).await.unwrap();

        assert_eq!(summary.items, 2);
        assert_eq!(summary.records[0].category, "Política");
        assert_eq!(summary.records[1].formatted_date, "08/08/2025 10:30:00");
        assert_eq!(
            summary.files,
            vec![dir.join("noticias.csv"), dir.join("noticias.json")]
        );
        assert!(summary.files.iter().all(|f| f.exists()));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Found 2 items"));
        assert!(text.contains("1. Primeira"));
        assert!(text.contains("Records processed: 2"));
        assert!(text.contains("lines: 3 (header included)"));
        assert!(text.contains("CSV PREVIEW"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_toggles_skip_preview_export_and_report() {
        let server = serve(FEED).await;
        let (dir, mut config) = test_config("toggles", format!("{}/rss", server.uri()));
        config.preview.enabled = false;
        config.output.write_csv = false;
        config.output.write_json = false;
        config.report.enabled = false;
        let pipeline = Pipeline::new(config).unwrap();

        let mut out = Vec::new();
        let summary = pipeline.run_once(&mut out).await.unwrap();

        assert_eq!(summary.records.len(), 2);
        assert!(summary.files.is_empty());
        assert!(!dir.exists());
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("LATEST ITEMS"));
        assert!(!text.contains("RUN REPORT"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_full_layout_is_used() {
        let server = serve(FEED).await;
        let (dir, mut config) = test_config("layout", format!("{}/rss", server.uri()));
        config.output.layout = ColumnLayout::Full;
        config.output.write_json = false;
        let csv_path = config.output.csv_path.clone();
        let pipeline = Pipeline::new(config).unwrap();

        pipeline.run_once(&mut Vec::new()).await.unwrap();
        let (header, rows) = crate::export::read_rows(&csv_path).unwrap();
        assert_eq!(header, ColumnLayout::Full.headers());
        assert_eq!(rows[1][5], "08/08/2025 10:30:00");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_stage_of_each_failure() {
        let server = serve("<rss><channel><item></channel></rss>").await;
        let (dir, config) = test_config("stages", format!("{}/rss", server.uri()));
        let pipeline = Pipeline::new(config).unwrap();

        let err = pipeline.run_once(&mut Vec::new()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Parsing);
        assert!(!dir.exists());

        let (_, config) = test_config("stages_fetch", format!("{}/missing", server.uri()));
        let pipeline = Pipeline::new(config).unwrap();
        let err = pipeline.run_once(&mut Vec::new()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Fetching);
        assert!(matches!(err, PipelineError::Fetch(FetchError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_monitor_exits_immediately_when_already_cancelled() {
        let server = MockServer::start().await;
        let (_, config) = test_config("monitor_cancelled", format!("{}/rss", server.uri()));
        let pipeline = Pipeline::new(config).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let summary = pipeline.monitor(cancel, &mut out).await;

        assert_eq!(summary, MonitorSummary::default());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_stops_during_interval_wait() {
        let server = serve(FEED).await;
        let (dir, mut config) = test_config("monitor_interval", format!("{}/rss", server.uri()));
        config.report.enabled = false;
        let pipeline = Pipeline::new(config).unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut out = Vec::new();
                let summary = pipeline.monitor(cancel, &mut out).await;
                (summary, String::from_utf8(out).unwrap())
            }
        });

        // The first run completes and the loop settles into its 30 minute wait.
        for _ in 0..200 {
            if !server.received_requests().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let (summary, text) = handle.await.unwrap();
        assert_eq!(summary, MonitorSummary { runs: 1, failures: 0 });
        assert!(!text.contains("LATEST ITEMS"));
        assert!(text.contains("Run #1 done: 2 records, 2 file(s) written"));
        assert!(text.contains("Monitoring stopped after 1 run(s)."));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_waits_cooldown_after_failure() {
        // Nothing listens on port 1; every run fails in the fetch stage.
        let (_, mut config) = test_config("monitor_cooldown", "http://127.0.0.1:1/rss".to_string());
        config.monitor.cooldown_secs = 60;
        let pipeline = Pipeline::new(config).unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { pipeline.monitor(cancel, &mut Vec::new()).await }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();

        let summary = handle.await.unwrap();
        assert!(summary.runs >= 2, "got {summary:?}");
        assert!(summary.runs <= 3, "got {summary:?}");
        assert_eq!(summary.failures, summary.runs);
    }

    /// Stdout that has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_keeps_running_when_console_is_closed() {
        // The first console line of each run fails, so no request is made.
        let (_, mut config) = test_config("monitor_closed_pipe", "http://127.0.0.1:1/rss".to_string());
        config.monitor.cooldown_secs = 60;
        let pipeline = Pipeline::new(config).unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { pipeline.monitor(cancel, &mut ClosedPipe).await }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();

        let summary = handle.await.unwrap();
        assert_eq!(summary, MonitorSummary { runs: 3, failures: 3 });
    }
}
