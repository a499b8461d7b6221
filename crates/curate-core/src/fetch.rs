//! Page fetching capability.
//!
//! The crawler, sitemap reader and summary step never talk to the network
//! directly; they go through a [`PageFetcher`]. [`HttpFetcher`] is the
//! production implementation, tests inject in-memory fakes.
//!
//! A fetcher returns `Ok` for every HTTP response it received, whatever the
//! status. Callers decide what a non-2xx status means for them. `Err` is
//! reserved for transport failures (DNS, connect, timeout).

use crate::config::CrawlConfig;
use crate::{Error, Result};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Longest `Retry-After` honoured before retrying.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// A fetched HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
    /// URL after redirects.
    pub final_url: String,
    /// `Content-Type` header, lower-cased.
    pub content_type: Option<String>,
}

impl FetchedPage {
    /// Successful HTML response with `final_url == url`.
    #[must_use]
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            final_url: url.into(),
            content_type: Some("text/html; charset=utf-8".to_string()),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body is HTML. A missing content type counts as HTML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_none_or(|ct| {
            ct.is_empty() || ct.contains("text/html") || ct.contains("application/xhtml+xml")
        })
    }

    /// Convert a non-2xx response into [`Error::HttpStatus`].
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::HttpStatus {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Capability to fetch a URL.
///
/// Implementations own their retry policy.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, following redirects.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// `reqwest`-backed fetcher with retries for rate limiting and server errors.
///
/// - `429` is retried after `Retry-After` (capped) or exponential backoff
/// - `5xx` is retried with exponential backoff
/// - `404` and other client errors are returned immediately
/// - connect errors and timeouts are retried, then surfaced as errors
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpFetcher {
    /// Build a fetcher from crawl settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(500),
        })
    }

    /// Override the base delay of the exponential backoff.
    #[must_use]
    pub const fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(10))
    }

    async fn fetch_once(&self, url: &str) -> Result<(FetchedPage, Option<Duration>)> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("{url}: {e}"))
            } else {
                Error::Network(e)
            }
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER));
        let body = response.text().await.map_err(Error::Network)?;

        Ok((
            FetchedPage {
                status: status.as_u16(),
                body,
                final_url,
                content_type,
            },
            retry_after,
        ))
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok((page, retry_after)) => {
                    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::OK);
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if !retryable || attempt >= self.max_retries {
                        debug!(status = page.status, attempt, "Fetched page");
                        return Ok(page);
                    }
                    let delay = retry_after.unwrap_or_else(|| self.backoff(attempt));
                    warn!(
                        status = page.status,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying after server pushback"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) if e.is_recoverable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(error = %e, category = e.category(), attempt, "Retrying failed fetch");
                    tokio::time::sleep(delay).await;
                },
                Err(e) => return Err(e),
            }
            attempt += 1;
        }
    }
}

/// In-memory fetcher shared by unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::{FetchedPage, PageFetcher};
    use crate::Result;
    use crate::normalize::normalize;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages keyed by normalized URL; anything else is a 404.
    #[derive(Debug, Default)]
    pub(crate) struct StaticFetcher {
        pages: HashMap<String, FetchedPage>,
        requests: Mutex<Vec<String>>,
    }

    fn key(url: &str) -> String {
        normalize(url).map_or_else(|_| url.to_string(), |k| k.as_str().to_string())
    }

    impl StaticFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_html(self, url: &str, body: &str) -> Self {
            self.with_page(url, FetchedPage::html(url, body))
        }

        pub(crate) fn with_page(mut self, url: &str, page: FetchedPage) -> Self {
            self.pages.insert(key(url), page);
            self
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            Ok(self.pages.get(&key(url)).cloned().unwrap_or_else(|| FetchedPage {
                status: 404,
                body: String::new(),
                final_url: url.to_string(),
                content_type: Some("text/html".to_string()),
            }))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_retries: u32) -> HttpFetcher {
        let config = CrawlConfig {
            max_retries,
            request_timeout_secs: 5,
            ..CrawlConfig::default()
        };
        HttpFetcher::new(&config)
            .unwrap()
            .with_backoff_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_fetches_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><title>Hi</title></html>", "text/html; charset=UTF-8"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/page", server.uri());
        let page = fetcher(0).fetch(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert!(page.is_html());
        assert!(page.body.contains("<title>Hi</title>"));
        assert_eq!(page.final_url, url);
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        // Given: One 503 followed by a 200
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .with_priority(2)
            .mount(&server)
            .await;

        // When
        let page = fetcher(2)
            .fetch(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();

        // Then
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "ok");
    }

    #[tokio::test]
    async fn test_rate_limit_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(2)
            .mount(&server)
            .await;

        let page = fetcher(1)
            .fetch(&format!("{}/limited", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 200);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let page = fetcher(3)
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 404);
        assert!(!page.is_success());
        assert!(matches!(
            page.error_for_status("x"),
            Err(Error::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let page = fetcher(2)
            .fetch(&format!("{}/down", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 500);
    }

    #[tokio::test]
    async fn test_connection_failure_is_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let result = fetcher(0).fetch("http://127.0.0.1:9/").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_is_html_content_types() {
        let mut page = FetchedPage::html("https://x.com", "");
        assert!(page.is_html());
        page.content_type = None;
        assert!(page.is_html());
        page.content_type = Some("application/pdf".to_string());
        assert!(!page.is_html());
    }
}
