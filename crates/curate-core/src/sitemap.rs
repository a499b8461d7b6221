//! Sitemap XML parsing and streamed sitemap reading.
//!
//! This module turns `sitemap.xml` documents into [`RawUrlEntry`] values.
//! Sitemap indexes are followed recursively up to a depth limit, every
//! document is read at most once per call, and a broken child sitemap is
//! logged and skipped instead of aborting the read.
//!
//! ## Quick Start
//!
//! ```no_run
//! use curate_core::sitemap::SitemapReader;
//! use curate_core::{CancellationToken, HttpFetcher, CrawlConfig};
//!
//! # async fn example() -> curate_core::Result<()> {
//! let fetcher = HttpFetcher::new(&CrawlConfig::default())?;
//! let reader = SitemapReader::new(&fetcher, CancellationToken::new());
//! let read = reader.read("https://example.com/sitemap.xml").await?;
//! println!("{} URLs, {} failed child sitemaps", read.entries.len(), read.failures.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Sitemap Formats
//!
//! - **Standard sitemap**: `<urlset>` with `<url>` entries
//! - **Sitemap index**: `<sitemapindex>` with `<sitemap>` entries pointing to
//!   other sitemaps
//!
//! Locations may be `http(s)` URLs, `file://` URLs or plain filesystem paths.

use crate::cancel::CancellationToken;
use crate::fetch::PageFetcher;
use crate::types::{FailedFetch, RawUrlEntry, SourceKind};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, Stream, StreamExt};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, instrument, warn};
use url::Url;

/// Default maximum sitemap-index nesting.
pub const DEFAULT_MAX_INDEX_DEPTH: u32 = 5;

/// Maximum number of child sitemaps followed from one index.
const MAX_CHILD_SITEMAPS: usize = 500;

/// A single `<url>` entry from a sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// The `<loc>` value.
    pub url: String,
    /// Parsed `<lastmod>`.
    pub lastmod: Option<DateTime<Utc>>,
    /// `<priority>` clamped to 0.0-1.0.
    pub priority: Option<f32>,
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<urlset>` document.
    UrlSet(Vec<SitemapEntry>),
    /// `<sitemapindex>` document listing child sitemap locations.
    Index(Vec<String>),
}

/// Item produced by [`SitemapReader::stream`].
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapEvent {
    /// One URL found in a sitemap.
    Entry(RawUrlEntry),
    /// A sitemap document that could not be fetched or parsed.
    Failed(FailedFetch),
}

/// Everything a [`SitemapReader::read`] call collected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapRead {
    /// URL entries in document order.
    pub entries: Vec<RawUrlEntry>,
    /// Child sitemaps that failed.
    pub failures: Vec<FailedFetch>,
    /// Whether reading stopped on cancellation.
    pub cancelled: bool,
}

/// Parse a sitemap or sitemap-index document.
///
/// The document kind is decided by the root element. `<url>` blocks without
/// a `<loc>` are skipped.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed XML or an unknown root element.
///
/// # Examples
///
/// ```
/// use curate_core::sitemap::{parse_sitemap_document, SitemapDocument};
///
/// let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
/// <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
///   <url><loc>https://example.com/page1</loc><lastmod>2024-01-15</lastmod></url>
/// </urlset>"#;
///
/// match parse_sitemap_document(xml).unwrap() {
///     SitemapDocument::UrlSet(entries) => assert_eq!(entries[0].url, "https://example.com/page1"),
///     SitemapDocument::Index(_) => unreachable!(),
/// }
/// ```
#[instrument(skip(xml), fields(xml_len = xml.len()))]
pub fn parse_sitemap_document(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut entries = Vec::new();
    let mut children = Vec::new();

    // State for the current <url> or <sitemap> block
    let mut in_block = false;
    let mut current_loc: Option<String> = None;
    let mut current_lastmod: Option<DateTime<Utc>> = None;
    let mut current_priority: Option<f32> = None;
    let mut current_element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if root.is_none() {
                    if name != "urlset" && name != "sitemapindex" {
                        return Err(Error::Parse(format!(
                            "Unexpected sitemap root element <{name}>"
                        )));
                    }
                    root = Some(name);
                } else {
                    match name.as_str() {
                        "url" | "sitemap" => {
                            in_block = true;
                            current_loc = None;
                            current_lastmod = None;
                            current_priority = None;
                        },
                        "loc" | "lastmod" | "priority" if in_block => {
                            current_element = Some(name);
                        },
                        _ => {},
                    }
                }
            },
            Ok(Event::Empty(e)) if root.is_none() => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name != "urlset" && name != "sitemapindex" {
                    return Err(Error::Parse(format!(
                        "Unexpected sitemap root element <{name}>"
                    )));
                }
                root = Some(name);
            },
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if (name == "url" || name == "sitemap") && in_block {
                    if let Some(loc) = current_loc.take() {
                        if name == "url" {
                            entries.push(SitemapEntry {
                                url: loc,
                                lastmod: current_lastmod.take(),
                                priority: current_priority.take(),
                            });
                        } else {
                            children.push(loc);
                        }
                    }
                    in_block = false;
                }
                current_element = None;
            },
            Ok(Event::Text(e)) => {
                if let Some(ref element) = current_element {
                    let text = e.unescape().map_err(|e| Error::Parse(e.to_string()))?;
                    apply_field(
                        element,
                        text.trim(),
                        &mut current_loc,
                        &mut current_lastmod,
                        &mut current_priority,
                    );
                }
            },
            Ok(Event::CData(e)) => {
                if let Some(ref element) = current_element {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    apply_field(
                        element,
                        text.trim(),
                        &mut current_loc,
                        &mut current_lastmod,
                        &mut current_priority,
                    );
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Parse(format!("XML parse error: {e}"))),
            _ => {},
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("sitemapindex") => Ok(SitemapDocument::Index(children)),
        Some(_) => Ok(SitemapDocument::UrlSet(entries)),
        None => Err(Error::Parse("Empty sitemap document".to_string())),
    }
}

fn apply_field(
    element: &str,
    text: &str,
    loc: &mut Option<String>,
    lastmod: &mut Option<DateTime<Utc>>,
    priority: &mut Option<f32>,
) {
    match element {
        "loc" if !text.is_empty() => *loc = Some(text.to_string()),
        "lastmod" => *lastmod = parse_lastmod(text),
        "priority" => *priority = parse_priority(text),
        _ => {},
    }
}

/// Parse a lastmod date string into a `DateTime<Utc>`.
///
/// Supports multiple date formats:
/// - `2024-01-15` (date only)
/// - `2024-01-15T10:30:00Z` (ISO 8601 with Z)
/// - `2024-01-15T10:30:00+00:00` (ISO 8601 with offset)
/// - `2024-01-15T10:30:00.000` (with milliseconds, no zone)
pub fn parse_lastmod(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }

    debug!(date_str = %s, "Could not parse lastmod date");
    None
}

/// Parse a priority value, clamping to 0.0-1.0 range.
fn parse_priority(s: &str) -> Option<f32> {
    s.parse::<f32>().ok().map(|p| p.clamp(0.0, 1.0))
}

/// Extract `Sitemap:` declarations from a robots.txt body.
///
/// Values are trimmed and deduplicated, declaration order is kept.
///
/// ```
/// use curate_core::sitemap::parse_robots_sitemaps;
///
/// let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://ex.com/sitemap.xml\nsitemap:https://ex.com/news.xml\n";
/// assert_eq!(
///     parse_robots_sitemaps(robots),
///     vec!["https://ex.com/sitemap.xml", "https://ex.com/news.xml"]
/// );
/// ```
#[must_use]
pub fn parse_robots_sitemaps(robots: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    robots
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("sitemap")
                .then(|| value.trim().to_string())
        })
        .filter(|value| !value.is_empty() && seen.insert(value.clone()))
        .collect()
}

/// Fetch `<scheme>://<host>/robots.txt` for `base` and return its sitemaps.
///
/// Any failure yields an empty list.
pub async fn fetch_robots_sitemaps(fetcher: &dyn PageFetcher, base: &Url) -> Vec<String> {
    let Some(host) = base.host_str() else {
        return Vec::new();
    };
    let port = base.port().map(|p| format!(":{p}")).unwrap_or_default();
    let robots_url = format!("{}://{host}{port}/robots.txt", base.scheme());
    match fetcher.fetch(&robots_url).await {
        Ok(page) if page.is_success() => parse_robots_sitemaps(&page.body),
        Ok(page) => {
            debug!(url = %robots_url, status = page.status, "No robots.txt");
            Vec::new()
        },
        Err(e) => {
            debug!(url = %robots_url, error = %e, "Could not read robots.txt");
            Vec::new()
        },
    }
}

/// Reads sitemaps through an injected [`PageFetcher`].
pub struct SitemapReader<'a> {
    fetcher: &'a dyn PageFetcher,
    cancel: CancellationToken,
    max_depth: u32,
    source_kind: SourceKind,
    source_priority: i32,
}

struct WalkState {
    pending: Vec<(String, u32)>,
    ready: VecDeque<SitemapEvent>,
    seen: HashSet<String>,
}

impl<'a> SitemapReader<'a> {
    /// Reader emitting [`SourceKind::Sitemap`] entries with priority 0.
    #[must_use]
    pub fn new(fetcher: &'a dyn PageFetcher, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            cancel,
            max_depth: DEFAULT_MAX_INDEX_DEPTH,
            source_kind: SourceKind::Sitemap,
            source_priority: 0,
        }
    }

    /// Limit sitemap-index nesting.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Tag emitted entries with a source kind and priority.
    #[must_use]
    pub const fn with_source(mut self, source_kind: SourceKind, source_priority: i32) -> Self {
        self.source_kind = source_kind;
        self.source_priority = source_priority;
        self
    }

    /// Lazily walk a sitemap and its children.
    ///
    /// Each call starts a fresh walk. Documents are fetched only as the
    /// stream is polled, and the walk ends early once the cancellation token
    /// trips.
    pub fn stream(&self, location: &str) -> impl Stream<Item = SitemapEvent> + '_ {
        let state = WalkState {
            pending: vec![(location.trim().to_string(), 0)],
            ready: VecDeque::new(),
            seen: HashSet::new(),
        };
        stream::unfold(state, move |state| self.next_event(state))
    }

    async fn next_event(&self, mut state: WalkState) -> Option<(SitemapEvent, WalkState)> {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((event, state));
            }
            let (location, depth) = state.pending.pop()?;
            if self.cancel.is_cancelled() {
                debug!(url = %location, "Sitemap walk cancelled");
                return None;
            }
            if !state.seen.insert(location.clone()) {
                debug!(url = %location, "Sitemap already read, skipping");
                continue;
            }

            debug!(url = %location, depth, "Reading sitemap");
            match self.load_document(&location).await {
                Ok(SitemapDocument::UrlSet(entries)) => {
                    state.ready.extend(entries.into_iter().map(|entry| {
                        SitemapEvent::Entry(
                            RawUrlEntry::new(entry.url, self.source_kind)
                                .with_priority(self.source_priority)
                                .with_lastmod(entry.lastmod),
                        )
                    }));
                },
                Ok(SitemapDocument::Index(children)) => {
                    if depth >= self.max_depth {
                        let error = Error::Parse(format!(
                            "Sitemap index nesting exceeds {} levels",
                            self.max_depth
                        ));
                        warn!(url = %location, error = %error, "Skipping nested sitemap index");
                        state
                            .ready
                            .push_back(SitemapEvent::Failed(FailedFetch::from_error(
                                location, &error,
                            )));
                        continue;
                    }
                    debug!(url = %location, child_count = children.len(), "Following sitemap index");
                    // Reverse so children are read in declaration order.
                    state.pending.extend(
                        children
                            .into_iter()
                            .take(MAX_CHILD_SITEMAPS)
                            .rev()
                            .map(|child| (child, depth + 1)),
                    );
                },
                Err(e) => {
                    warn!(url = %location, error = %e, category = e.category(), "Failed to read sitemap");
                    state
                        .ready
                        .push_back(SitemapEvent::Failed(FailedFetch::from_error(location, &e)));
                },
            }
        }
    }

    async fn load_document(&self, location: &str) -> Result<SitemapDocument> {
        let xml = if location.starts_with("http://") || location.starts_with("https://") {
            let page = self.fetcher.fetch(location).await?.error_for_status(location)?;
            page.body
        } else {
            let path = Url::parse(location)
                .ok()
                .filter(|u| u.scheme() == "file")
                .and_then(|u| u.to_file_path().ok())
                .unwrap_or_else(|| location.into());
            tokio::fs::read_to_string(&path).await?
        };
        parse_sitemap_document(&xml)
    }

    /// Read a whole sitemap tree into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceFetch`] when the root document itself cannot be
    /// read. Failures of child sitemaps are reported in
    /// [`SitemapRead::failures`] instead.
    pub async fn read(&self, location: &str) -> Result<SitemapRead> {
        let root = location.trim().to_string();
        let mut read = SitemapRead::default();
        let mut events = Box::pin(self.stream(location));
        while let Some(event) = events.next().await {
            match event {
                SitemapEvent::Entry(entry) => read.entries.push(entry),
                SitemapEvent::Failed(failure) => read.failures.push(failure),
            }
        }
        read.cancelled = self.cancel.is_cancelled();

        if read.entries.is_empty() {
            if let Some(root_failure) = read.failures.iter().find(|f| f.url == root) {
                return Err(Error::SourceFetch {
                    source_name: root,
                    reason: root_failure.reason.clone(),
                });
            }
        }
        Ok(read)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use crate::config::CrawlConfig;
    use crate::fetch::HttpFetcher;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urls(document: SitemapDocument) -> Vec<String> {
        match document {
            SitemapDocument::UrlSet(entries) => entries.into_iter().map(|e| e.url).collect(),
            SitemapDocument::Index(children) => children,
        }
    }

    fn fetcher() -> HttpFetcher {
        let config = CrawlConfig {
            max_retries: 0,
            ..CrawlConfig::default()
        };
        HttpFetcher::new(&config).unwrap()
    }

    async fn serve_xml(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(server)
            .await;
    }

    fn urlset(locs: &[&str]) -> String {
        let body: String = locs
            .iter()
            .map(|l| format!("<url><loc>{l}</loc></url>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</urlset>"#
        )
    }

    fn index(locs: &[String]) -> String {
        let body: String = locs
            .iter()
            .map(|l| format!("<sitemap><loc>{l}</loc></sitemap>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</sitemapindex>"#
        )
    }

    #[test]
    fn test_parses_basic_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <loc>https://example.com/page1</loc>
            <lastmod>2024-01-15T10:30:00+00:00</lastmod>
            <changefreq>weekly</changefreq>
            <priority>1.8</priority>
          </url>
          <url><lastmod>2024-01-15</lastmod></url>
        </urlset>"#;

        let SitemapDocument::UrlSet(entries) = parse_sitemap_document(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://example.com/page1");
        assert!(entries[0].lastmod.is_some());
        assert_eq!(entries[0].priority, Some(1.0));
    }

    #[test]
    fn test_detects_index_by_root_element() {
        let xml = index(&["https://ex.com/a.xml".to_string()]);
        assert_eq!(
            parse_sitemap_document(&xml).unwrap(),
            SitemapDocument::Index(vec!["https://ex.com/a.xml".to_string()])
        );
    }

    #[test]
    fn test_handles_entities_and_cdata() {
        let xml = r#"<urlset><url><loc>https://ex.com/a?x=1&amp;y=2</loc></url>
            <url><loc><![CDATA[https://ex.com/b]]></loc></url></urlset>"#;
        assert_eq!(
            urls(parse_sitemap_document(xml).unwrap()),
            vec!["https://ex.com/a?x=1&y=2", "https://ex.com/b"]
        );
    }

    #[test]
    fn test_lastmod_formats() {
        for s in [
            "2024-01-15",
            "2024-01-15T10:30:00Z",
            "2024-01-15T10:30:00+02:00",
            "2024-01-15T10:30:00",
            "2024-01-15T10:30:00.123",
        ] {
            assert!(parse_lastmod(s).is_some(), "{s} should parse");
        }
        assert!(parse_lastmod("yesterday").is_none());
    }

    #[test]
    fn test_rejects_malformed_and_foreign_documents() {
        let malformed = r#"<urlset><url><loc>https://example.com/page1
          </url></urlset>"#;
        assert!(matches!(parse_sitemap_document(malformed), Err(Error::Parse(_))));
        assert!(parse_sitemap_document("<html><body/></html>").is_err());
        assert!(parse_sitemap_document("").is_err());
    }

    #[tokio::test]
    async fn test_reads_index_in_declaration_order() {
        let server = MockServer::start().await;
        let uri = server.uri();
        serve_xml(
            &server,
            "/sitemap.xml",
            index(&[format!("{uri}/one.xml"), format!("{uri}/two.xml")]),
        )
        .await;
        serve_xml(&server, "/one.xml", urlset(&["https://ex.com/a", "https://ex.com/b"])).await;
        serve_xml(&server, "/two.xml", urlset(&["https://ex.com/c"])).await;

        let fetcher = fetcher();
        let reader = SitemapReader::new(&fetcher, CancellationToken::new())
            .with_source(SourceKind::Subdomain, 7);
        let read = reader.read(&format!("{uri}/sitemap.xml")).await.unwrap();

        let got: Vec<_> = read.entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(got, vec!["https://ex.com/a", "https://ex.com/b", "https://ex.com/c"]);
        assert!(read.entries.iter().all(|e| e.source_priority == 7));
        assert!(read.entries.iter().all(|e| e.source_kind == SourceKind::Subdomain));
        assert!(read.failures.is_empty());
    }

    #[tokio::test]
    async fn test_child_failure_is_skipped() {
        // Given: An index whose first child 404s and whose second child is malformed
        let server = MockServer::start().await;
        let uri = server.uri();
        serve_xml(
            &server,
            "/sitemap.xml",
            index(&[
                format!("{uri}/missing.xml"),
                format!("{uri}/broken.xml"),
                format!("{uri}/good.xml"),
            ]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        serve_xml(&server, "/broken.xml", "<urlset><url><loc>https://ex.com/x</url></urlset>".to_string()).await;
        serve_xml(&server, "/good.xml", urlset(&["https://ex.com/ok"])).await;

        // When
        let fetcher = fetcher();
        let read = SitemapReader::new(&fetcher, CancellationToken::new())
            .read(&format!("{uri}/sitemap.xml"))
            .await
            .unwrap();

        // Then: The good child is read and both failures are reported
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.failures.len(), 2);
        assert_eq!(read.failures[0].category, "http_status");
    }

    #[tokio::test]
    async fn test_root_failure_is_source_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let result = SitemapReader::new(&fetcher, CancellationToken::new())
            .read(&format!("{}/sitemap.xml", server.uri()))
            .await;
        assert!(matches!(result, Err(Error::SourceFetch { .. })));
    }

    #[tokio::test]
    async fn test_self_referencing_index_terminates() {
        let server = MockServer::start().await;
        let uri = server.uri();
        serve_xml(
            &server,
            "/loop.xml",
            index(&[format!("{uri}/loop.xml"), format!("{uri}/leaf.xml")]),
        )
        .await;
        serve_xml(&server, "/leaf.xml", urlset(&["https://ex.com/leaf"])).await;

        let fetcher = fetcher();
        let read = SitemapReader::new(&fetcher, CancellationToken::new())
            .read(&format!("{uri}/loop.xml"))
            .await
            .unwrap();
        assert_eq!(read.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_depth_limit_reports_failure() {
        let server = MockServer::start().await;
        let uri = server.uri();
        serve_xml(&server, "/a.xml", index(&[format!("{uri}/b.xml")])).await;
        serve_xml(&server, "/b.xml", index(&[format!("{uri}/c.xml")])).await;
        serve_xml(&server, "/c.xml", urlset(&["https://ex.com/deep"])).await;

        let fetcher = fetcher();
        let read = SitemapReader::new(&fetcher, CancellationToken::new())
            .with_max_depth(1)
            .read(&format!("{uri}/a.xml"))
            .await
            .unwrap();
        assert!(read.entries.is_empty());
        assert_eq!(read.failures.len(), 1);
        assert!(read.failures[0].url.ends_with("/b.xml"));
    }

    #[tokio::test]
    async fn test_cancelled_reader_stops_before_fetching() {
        let fetcher = fetcher();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let read = SitemapReader::new(&fetcher, cancel)
            .read("http://127.0.0.1:9/sitemap.xml")
            .await
            .unwrap();
        assert!(read.entries.is_empty());
        assert!(read.failures.is_empty());
        assert!(read.cancelled);
    }

    #[tokio::test]
    async fn test_reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(urlset(&["https://ex.com/local"]).as_bytes())
            .unwrap();

        let fetcher = fetcher();
        let reader = SitemapReader::new(&fetcher, CancellationToken::new());
        let read = reader
            .read(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(read.entries[0].url, "https://ex.com/local");

        let missing = reader.read("/no/such/sitemap.xml").await;
        assert!(matches!(missing, Err(Error::SourceFetch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_robots_sitemaps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nSitemap: https://ex.com/s1.xml\n"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let base = Url::parse(&format!("{}/docs/", server.uri())).unwrap();
        let found = fetch_robots_sitemaps(&fetcher, &base).await;
        assert_eq!(found, vec!["https://ex.com/s1.xml"]);
    }
}
