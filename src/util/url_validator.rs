use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the feed source URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as the feed source.
///
/// Only `http` and `https` URLs with a host are accepted. Loopback and
/// private addresses are allowed so a run can target a local fixture server.
///
/// # Examples
///
/// ```
/// use feedscrape::util::validate_source_url;
///
/// let url = validate_source_url("https://example.com/rss/").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_source_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_source_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}
