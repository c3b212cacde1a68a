//! Configuration file parser for `feedscrape.toml`.
//!
//! The config file is optional. A missing file yields `Config::default()`,
//! which points at the G1 Brasil feed and writes both export files to the
//! working directory. Unknown keys are accepted but logged as warnings.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::export::ColumnLayout;
use crate::util::{validate_source_url, UrlValidationError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid source_url: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

pub const DEFAULT_SOURCE_URL: &str = "https://g1.globo.com/rss/g1/brasil/";

/// Sent on every request; some news sites refuse the default client UA.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub output: OutputConfig,
    pub preview: PreviewConfig,
    pub report: ReportConfig,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            output: OutputConfig::default(),
            preview: PreviewConfig::default(),
            report: ReportConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// `[output]`: where and how the export files are written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub write_csv: bool,
    pub write_json: bool,
    pub layout: ColumnLayout,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("noticias_g1.csv"),
            json_path: PathBuf::from("noticias_g1.json"),
            write_csv: true,
            write_json: true,
            layout: ColumnLayout::Compact,
        }
    }
}

/// `[preview]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub limit: usize,
    /// Description cut-off in terminal columns, ellipsis included.
    pub description_width: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 5,
            description_width: 150,
        }
    }
}

/// `[report]`: post-export summaries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub top_categories: usize,
    pub csv_preview_rows: usize,
    pub csv_cell_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_categories: 3,
            csv_preview_rows: 5,
            csv_cell_width: 50,
        }
    }
}

/// `[monitor]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Wait after a successful run.
    pub interval_minutes: u64,
    /// Wait after a failed run.
    pub cooldown_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            cooldown_secs: 60,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source_url: Option<String>,
    pub interval_minutes: Option<u64>,
    pub no_preview: bool,
    pub no_export: bool,
    pub no_report: bool,
}

const KNOWN_SECTIONS: [(&str, &[&str]); 4] = [
    (
        "output",
        &["csv_path", "json_path", "write_csv", "write_json", "layout"],
    ),
    ("preview", &["enabled", "limit", "description_width"]),
    (
        "report",
        &["enabled", "top_categories", "csv_preview_rows", "csv_cell_width"],
    ),
    ("monitor", &["interval_minutes", "cooldown_secs"]),
];

const KNOWN_TOP_LEVEL: [&str; 3] = ["source_url", "user_agent", "request_timeout_secs"];

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] after applying
    /// any overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), source_url = %config.source_url, "Loaded configuration");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(url) = &overrides.source_url {
            self.source_url = url.clone();
        }
        if let Some(minutes) = overrides.interval_minutes {
            self.monitor.interval_minutes = minutes;
        }
        if overrides.no_preview {
            self.preview.enabled = false;
        }
        if overrides.no_export {
            self.output.write_csv = false;
            self.output.write_json = false;
        }
        if overrides.no_report {
            self.report.enabled = false;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_source_url(&self.source_url)?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.monitor.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "monitor.interval_minutes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        if KNOWN_TOP_LEVEL.contains(&key.as_str()) {
            continue;
        }
        match KNOWN_SECTIONS.iter().find(|(name, _)| *name == key.as_str()) {
            Some((section, fields)) => {
                if let Some(table) = value.as_table() {
                    for sub in table.keys() {
                        if !fields.contains(&sub.as_str()) {
                            tracing::warn!(key = %format!("{section}.{sub}"), "Unknown key in config file, ignoring");
                        }
                    }
                }
            }
            None => tracing::warn!(key = %key, "Unknown key in config file, ignoring"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
