use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use feedscrape::config::{Config, Overrides};
use feedscrape::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "feedscrape",
    version,
    about = "Fetch an RSS feed and export its items as CSV and JSON"
)]
struct Args {
    /// Config file; missing means defaults
    #[arg(long, value_name = "FILE", default_value = "feedscrape.toml")]
    config: PathBuf,

    /// Feed URL, overrides `source_url`
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Keep running, repeating the pipeline on an interval
    #[arg(long)]
    monitor: bool,

    /// Minutes between monitor runs, overrides `monitor.interval_minutes`
    #[arg(long, value_name = "MINUTES")]
    interval: Option<u64>,

    /// Skip the item preview
    #[arg(long)]
    no_preview: bool,

    /// Skip writing the CSV and JSON files
    #[arg(long)]
    no_export: bool,

    /// Skip the category and output reports
    #[arg(long)]
    no_report: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            source_url: self.url.clone(),
            interval_minutes: self.interval,
            no_preview: self.no_preview,
            no_export: self.no_export,
            no_report: self.no_report,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the preview and reports.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.apply(&args.overrides());
    config.validate().context("Invalid configuration")?;

    let pipeline = Pipeline::new(config).context("Failed to set up the HTTP client")?;
    let mut stdout = std::io::stdout();

    if args.monitor {
        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                cancel.cancel();
            }
        });

        let summary = pipeline.monitor(cancel, &mut stdout).await;
        tracing::debug!(runs = summary.runs, failures = summary.failures, "Monitor finished");
        return Ok(());
    }

    let started = std::time::Instant::now();
    let summary = pipeline
        .run_once(&mut stdout)
        .await
        .context("Pipeline run failed")?;

    writeln!(
        stdout,
        "\nDone in {:.1}s: {} items, {} records, {} file(s) written",
        started.elapsed().as_secs_f64(),
        summary.items,
        summary.records.len(),
        summary.files.len()
    )?;
    Ok(())
}
