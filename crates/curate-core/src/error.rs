//! Error types and handling for curate-core operations.
//!
//! This module provides the error type shared by every stage of the curation
//! pipeline. Errors are categorized for structured logging and carry a
//! recoverability hint that drives the HTTP fetcher's retry loop.
//!
//! ## Error Categories
//!
//! - **Per-entry errors**: malformed URLs, dropped without aborting the run
//! - **Per-source errors**: a sitemap, crawl seed or static list that failed
//! - **Whole-run errors**: no URLs collected at all, or cancellation
//! - **Plumbing errors**: network, I/O, parsing and configuration failures
//!
//! ## Recovery Hints
//!
//! ```rust
//! use curate_core::Error;
//!
//! let err = Error::HttpStatus { url: "https://example.com".into(), status: 503 };
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "http_status");
//!
//! let err = Error::MalformedUrl("not a url".into());
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// The main error type for curate-core operations.
///
/// Most pipeline failures are recovered locally (the entry or source is
/// skipped and recorded in the run diagnostics). Only [`Error::EmptyCollection`]
/// and [`Error::Cancelled`] are meant to end a run early.
#[derive(Error, Debug)]
pub enum Error {
    /// A URL string could not be parsed as an absolute URL.
    ///
    /// Raised by the normalizer. Entries carrying such a URL are dropped
    /// and counted; the run continues.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// A configured source could not be read.
    ///
    /// Covers sitemap downloads, local sitemap files, crawl seeds and static
    /// URL lists. The source is skipped and the pipeline continues with the
    /// remaining sources.
    #[error("Source '{source_name}' failed: {reason}")]
    SourceFetch {
        /// URL or path identifying the source.
        source_name: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// No source produced a single URL.
    ///
    /// There is nothing to curate, so this is surfaced to the caller
    /// instead of emitting empty outputs.
    #[error("No URLs were collected from any source")]
    EmptyCollection,

    /// Configuration is internally inconsistent.
    ///
    /// For example a group referenced in `group_limits` that no rule or
    /// category can ever produce. Reported as a warning, never fatal.
    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// Network operation failed.
    ///
    /// The underlying `reqwest::Error` is preserved for connection details.
    ///
    /// ## Recoverability
    ///
    /// Connection and timeout errors are recoverable, everything else is not.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status code.
    ///
    /// ## Recoverability
    ///
    /// `429 Too Many Requests` and 5xx responses are recoverable.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Status code returned by the server.
        status: u16,
    },

    /// Parsing failed (sitemap XML, robots.txt, HTML).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// ## Common Causes
    ///
    /// - Invalid TOML syntax in the configuration file
    /// - A regex pattern in a filter rule that does not compile
    /// - A base URL that is not an absolute URL
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed (local sitemap files, static URL lists).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its deadline.
    ///
    /// This is typically recoverable with retry logic.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The run was cancelled by the caller or by a page/time budget.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::MalformedUrl(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::Config(format!("Invalid pattern: {err}"))
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for errors that are typically temporary: network
    /// timeouts and connection failures, rate limiting, server errors and
    /// interrupted I/O.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use curate_core::Error;
    ///
    /// assert!(Error::Timeout("slow".into()).is_recoverable());
    /// assert!(Error::HttpStatus { url: "u".into(), status: 429 }.is_recoverable());
    /// assert!(!Error::HttpStatus { url: "u".into(), status: 404 }.is_recoverable());
    /// assert!(!Error::Parse("bad xml".into()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Used as the `category` field in structured log events so recovered
    /// failures can be grouped without matching on message text.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::MalformedUrl(_) => "malformed_url",
            Self::SourceFetch { .. } => "source_fetch",
            Self::EmptyCollection => "empty_collection",
            Self::ConfigurationConflict(_) => "configuration_conflict",
            Self::Network(_) => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Timeout(_) => "timeout",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        // Given: Variants from each failure class
        let cases = vec![
            (Error::MalformedUrl("::".to_string()), "Malformed URL"),
            (
                Error::SourceFetch {
                    source_name: "https://ex.com/sitemap.xml".to_string(),
                    reason: "HTTP 500".to_string(),
                },
                "https://ex.com/sitemap.xml",
            ),
            (Error::EmptyCollection, "No URLs"),
            (
                Error::ConfigurationConflict("group 'Blog'".to_string()),
                "Configuration conflict",
            ),
            (Error::Config("bad".to_string()), "Configuration error"),
            (Error::Cancelled("page limit".to_string()), "Cancelled"),
        ];

        for (error, needle) in cases {
            // When: Converting to string
            let rendered = error.to_string();

            // Then: The message names the failure
            assert!(rendered.contains(needle), "{rendered} should contain {needle}");
        }
    }

    #[test]
    fn test_error_categories() {
        let cases = vec![
            (Error::MalformedUrl(String::new()), "malformed_url"),
            (Error::EmptyCollection, "empty_collection"),
            (
                Error::ConfigurationConflict(String::new()),
                "configuration_conflict",
            ),
            (
                Error::HttpStatus {
                    url: String::new(),
                    status: 500,
                },
                "http_status",
            ),
            (Error::Io(io::Error::other("x")), "io"),
            (Error::Timeout(String::new()), "timeout"),
            (Error::Cancelled(String::new()), "cancelled"),
            (
                Error::SourceFetch {
                    source_name: String::new(),
                    reason: String::new(),
                },
                "source_fetch",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.category(), expected);
        }
    }

    #[test]
    fn test_error_recoverability() {
        // Given: Transient and permanent failures
        let recoverable = vec![
            Error::Timeout("request timeout".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
            Error::HttpStatus {
                url: "u".to_string(),
                status: 429,
            },
            Error::HttpStatus {
                url: "u".to_string(),
                status: 503,
            },
        ];
        let permanent = vec![
            Error::HttpStatus {
                url: "u".to_string(),
                status: 404,
            },
            Error::MalformedUrl("x".to_string()),
            Error::EmptyCollection,
            Error::Parse("x".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::NotFound, "missing")),
        ];

        // When/Then
        for error in recoverable {
            assert!(error.is_recoverable(), "Expected {error:?} to be recoverable");
        }
        for error in permanent {
            assert!(!error.is_recoverable(), "Expected {error:?} to be permanent");
        }
    }

    #[test]
    fn test_error_from_conversions() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, Error::MalformedUrl(_)));

        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));

        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
