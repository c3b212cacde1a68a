//! Utility functions shared by the pipeline and the reports.
//!
//! - **URL validation**: scheme and host checks for the configured feed source
//! - **Text processing**: Unicode-aware truncation and terminal sanitizing
//!   for console output built from remote feed text
//!
//! # Examples
//!
//! ```
//! use feedscrape::util::{truncate_to_width, validate_source_url};
//!
//! let url = validate_source_url("https://example.com/rss").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(truncate_to_width("Long article title", 10), "Long ar...");
//! ```

mod text;
mod url_validator;

pub use text::{console_line, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_source_url, UrlValidationError};
