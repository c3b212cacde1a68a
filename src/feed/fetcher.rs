use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Largest feed body accepted, in bytes.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur while fetching the feed document.
///
/// Every variant ends the run; nothing here is retried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed (bad user agent, TLS setup)
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// DNS, connect, TLS or body stream failure
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// The server answered with a status outside 2xx
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request plus body read exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Body larger than `MAX_FEED_SIZE`
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body ended before the advertised `Content-Length`
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Builds the client used for the single feed request.
///
/// The user agent is set on every request; some servers reject the default one.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(FetchError::Client)
}

/// Fetches `url` and returns the body as text.
///
/// Sends one GET. Any non-2xx status, network error or timeout is a
/// [`FetchError`]. The body is decoded as UTF-8 whatever charset the server
/// declares; invalid sequences become U+FFFD.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    fetch_limited(client, url, timeout, MAX_FEED_SIZE).await
}

async fn fetch_limited(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    limit: usize,
) -> Result<String, FetchError> {
    let bytes = tokio::time::timeout(timeout, send_and_read(client, url, limit, timeout))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed document");

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn send_and_read(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(network_error(timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    read_limited_bytes(response, limit, timeout).await
}

/// reqwest reports its own timeout as an error; keep it distinguishable.
fn network_error(timeout: Duration) -> impl Fn(reqwest::Error) -> FetchError {
    move |e| {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(e)
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(network_error(timeout))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
    const TIMEOUT: Duration = Duration::from_secs(5);

    const FEED_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>g1</title>
  <item><title>Notícia</title><guid>g1-1</guid></item>
</channel></rss>"#;

    fn client() -> reqwest::Client {
        build_client(UA, TIMEOUT).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .and(header("user-agent", UA))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(FEED_BODY)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = fetch(&client(), &format!("{}/rss", mock_server.uri()), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(body, FEED_BODY);
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = fetch(&client(), &mock_server.uri(), TIMEOUT).await;
        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fetch(&client(), &mock_server.uri(), TIMEOUT).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(FEED_BODY)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let short = Duration::from_millis(200);
        let client = build_client(UA, short).unwrap();
        let result = fetch(&client, &mock_server.uri(), short).await;
        assert!(
            matches!(result, Err(FetchError::Timeout(_))),
            "got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_fetch_decodes_as_utf8_despite_charset() {
        let mock_server = MockServer::start().await;
        let mut body = "<rss><item><title>Não</title></item></rss>".as_bytes().to_vec();
        body.push(0xff);
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body)
                    .insert_header("Content-Type", "text/xml; charset=ISO-8859-1"),
            )
            .mount(&mock_server)
            .await;

        let text = fetch(&client(), &mock_server.uri(), TIMEOUT).await.unwrap();
        assert!(text.starts_with("<rss><item><title>Não</title>"));
        assert!(text.ends_with('\u{fffd}'));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let result = fetch_limited(&client(), &mock_server.uri(), TIMEOUT, 32).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind and drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = fetch(&client(), &format!("http://{addr}/rss"), TIMEOUT).await;
        assert!(matches!(result, Err(FetchError::Network(_))), "got {:?}", result);
    }
}
