//! Bounded breadth-first crawler.
//!
//! A crawl starts from one or more entry URLs at depth 0 and walks
//! same-site links level by level until the frontier is empty or
//! `max_depth` is reached. Pages inside one batch are fetched concurrently
//! (bounded by `concurrency`) while [`HostThrottle`] keeps requests to the
//! same host spaced out.
//!
//! Traversal state lives in a [`CrawlContext`] owned by one
//! [`Crawler::crawl`] call, so independent crawls never share a frontier.
//!
//! Pagination links (`rel="next"`, `?page=2`, `/page/2`) are queued at the
//! depth of the page that links to them, which keeps long listings reachable
//! even at the depth limit. They are capped by `max_pagination_pages`.

use crate::cancel::CancellationToken;
use crate::config::CrawlConfig;
use crate::fetch::{FetchedPage, PageFetcher};
use crate::normalize::{self, HostAllowList, canonicalize, resolve};
use crate::politeness::HostThrottle;
use crate::summary::{PageSummary, Summarizer};
use crate::types::{FailedFetch, NormalizedKey, RawUrlEntry, SourceKind};
use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// SAFETY: Selector is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// SAFETY: Selector is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static REL_NEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="next"][href]"#).unwrap());

/// SAFETY: Regex is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static PAGINATION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/page/\d+/?$").unwrap());

/// Query parameters that carry a page number.
const PAGINATION_PARAMS: &[&str] = &["page", "p", "paged", "pg"];

/// One crawl invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Entry URLs, all queued at depth 0.
    pub entry_urls: Vec<String>,
    /// Maximum link depth.
    pub max_depth: u32,
    /// Maximum pages emitted; 0 means unlimited.
    pub max_urls: usize,
    /// Priority stamped on every emitted entry.
    pub source_priority: i32,
}

impl CrawlRequest {
    /// Crawl from a single entry URL.
    #[must_use]
    pub fn new(entry_url: impl Into<String>, max_depth: u32) -> Self {
        Self {
            entry_urls: vec![entry_url.into()],
            max_depth,
            max_urls: 0,
            source_priority: 0,
        }
    }

    /// Cap the number of emitted pages.
    #[must_use]
    pub const fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls;
        self
    }

    /// Priority stamped on emitted entries.
    #[must_use]
    pub const fn with_priority(mut self, source_priority: i32) -> Self {
        self.source_priority = source_priority;
        self
    }
}

/// What a crawl produced.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Pages fetched successfully, in traversal order.
    pub entries: Vec<RawUrlEntry>,
    /// Pages that could not be fetched.
    pub failures: Vec<FailedFetch>,
    /// Summaries extracted while crawling, when a summarizer was attached.
    pub summaries: HashMap<NormalizedKey, PageSummary>,
    /// Whether the crawl stopped on cancellation.
    pub cancelled: bool,
}

/// A link found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    url: Url,
    pagination: bool,
}

/// Mutable traversal state of one crawl.
///
/// Every URL is claimed in `visited` before it is queued, so concurrent
/// batch members can never enqueue the same page twice.
#[derive(Debug, Default)]
pub struct CrawlContext {
    frontier: VecDeque<(Url, u32)>,
    visited: HashSet<NormalizedKey>,
    emitted: usize,
    pagination_followed: usize,
    outcome: CrawlOutcome,
}

impl CrawlContext {
    /// Claim `url`; returns `false` when it was already seen.
    fn claim(&mut self, url: &Url) -> bool {
        match normalize::normalize(url.as_str()) {
            Ok(key) => self.visited.insert(key),
            Err(_) => false,
        }
    }

    /// Number of URLs claimed so far.
    #[must_use]
    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

/// Breadth-first crawler over an injected [`PageFetcher`].
pub struct Crawler<'a> {
    fetcher: &'a dyn PageFetcher,
    throttle: &'a HostThrottle,
    cancel: CancellationToken,
    summarizer: Option<&'a dyn Summarizer>,
    concurrency: usize,
    allowed: HostAllowList,
    max_pagination_pages: usize,
}

impl<'a> Crawler<'a> {
    /// Crawler limited to the hosts admitted by `allowed`.
    #[must_use]
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        throttle: &'a HostThrottle,
        cancel: CancellationToken,
        config: &CrawlConfig,
        allowed: HostAllowList,
    ) -> Self {
        Self {
            fetcher,
            throttle,
            cancel,
            summarizer: None,
            concurrency: config.concurrency.max(1),
            allowed,
            max_pagination_pages: config.max_pagination_pages,
        }
    }

    /// Extract page summaries while crawling.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: &'a dyn Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    fn url_allowed(&self, url: &Url) -> bool {
        self.allowed.allows_url(url)
    }

    /// Run a crawl and return everything it found.
    ///
    /// Per-page failures are recorded in [`CrawlOutcome::failures`] and never
    /// stop the traversal. Cancellation stops further fetches and returns the
    /// partial outcome.
    #[instrument(skip(self, request), fields(entries = request.entry_urls.len(), max_depth = request.max_depth))]
    pub async fn crawl(&self, request: &CrawlRequest) -> CrawlOutcome {
        let context = Mutex::new(CrawlContext::default());
        {
            let mut ctx = lock(&context);
            for raw in &request.entry_urls {
                match canonicalize(raw) {
                    Ok(url) if self.url_allowed(&url) => {
                        if ctx.claim(&url) {
                            ctx.frontier.push_back((url, 0));
                        }
                    },
                    Ok(url) => debug!(url = %url, "Entry URL outside allowed hosts"),
                    Err(e) => {
                        ctx.outcome.failures.push(FailedFetch::from_error(raw.clone(), &e));
                    },
                }
            }
        }

        loop {
            let batch: Vec<(Url, u32)> = lock(&context).frontier.drain(..).collect();
            if batch.is_empty() {
                break;
            }
            if self.cancel.is_cancelled() {
                break;
            }
            debug!(batch_size = batch.len(), "Crawling batch");
            stream::iter(batch)
                .map(|(url, depth)| self.visit(url, depth, request, &context))
                .buffered(self.concurrency)
                .collect::<Vec<()>>()
                .await;
        }

        let mut ctx = context.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
        ctx.outcome.cancelled = self.cancel.is_cancelled();
        info!(
            pages = ctx.outcome.entries.len(),
            failures = ctx.outcome.failures.len(),
            visited = ctx.visited_len(),
            cancelled = ctx.outcome.cancelled,
            "Crawl finished"
        );
        ctx.outcome
    }

    async fn visit(&self, url: Url, depth: u32, request: &CrawlRequest, context: &Mutex<CrawlContext>) {
        if normalize::should_skip_by_extension(url.as_str()) {
            debug!(url = %url, "Skipping static asset");
            return;
        }
        if request.max_urls > 0 && lock(context).emitted >= request.max_urls {
            return;
        }
        if !self.cancel.try_claim_page() {
            return;
        }

        let host = url.host_str().unwrap_or_default().to_string();
        let fetched = {
            let _slot = self.throttle.acquire(&host).await;
            self.fetcher.fetch(url.as_str()).await
        };

        let page = match fetched.and_then(|page| page.error_for_status(url.as_str())) {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, category = e.category(), "Failed to crawl page");
                lock(context).outcome.failures.push(FailedFetch::from_error(url.as_str(), &e));
                return;
            },
        };
        if !page.is_html() {
            debug!(url = %url, content_type = ?page.content_type, "Skipping non-HTML page");
            return;
        }

        let summary = self.summarizer.map(|s| s.summarize(&page));
        let links = extract_links(&page, &url);

        let mut ctx = lock(context);
        if request.max_urls > 0 && ctx.emitted >= request.max_urls {
            return;
        }
        ctx.emitted += 1;
        ctx.outcome.entries.push(
            RawUrlEntry::new(url.as_str(), SourceKind::Crawl)
                .with_priority(request.source_priority)
                .with_depth(depth),
        );
        if let Some(summary) = summary.filter(|s| !s.is_empty()) {
            if let Ok(key) = normalize::normalize(url.as_str()) {
                ctx.outcome.summaries.insert(key, summary);
            }
        }

        for link in links {
            if !self.url_allowed(&link.url) {
                continue;
            }
            let next_depth = if link.pagination { depth } else { depth + 1 };
            if link.pagination {
                if ctx.pagination_followed >= self.max_pagination_pages {
                    continue;
                }
            } else if next_depth > request.max_depth {
                continue;
            }
            if ctx.claim(&link.url) {
                if link.pagination {
                    ctx.pagination_followed += 1;
                }
                ctx.frontier.push_back((link.url, next_depth));
            }
        }
    }
}

fn lock(context: &Mutex<CrawlContext>) -> MutexGuard<'_, CrawlContext> {
    context.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Whether an `href` is worth resolving at all.
///
/// Rejects script and contact schemes, bare fragments, template residue and
/// bare words that would resolve to nonsense relative paths.
fn is_crawlable_href(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
        || lower.contains("classname")
    {
        return false;
    }
    if lower.contains("://") || href.starts_with("//") {
        return true;
    }
    if href.contains('@') {
        return false;
    }
    href.starts_with('/') || href.starts_with('?') || href.starts_with("./") || href.starts_with("../")
}

/// Whether a URL looks like the next page of a listing.
fn is_pagination_url(url: &Url) -> bool {
    if PAGINATION_PATH.is_match(url.path()) {
        return true;
    }
    url.query_pairs().any(|(key, value)| {
        PAGINATION_PARAMS.contains(&key.as_ref()) && !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
    })
}

/// Pull links out of an HTML page, resolved against its final URL.
///
/// An anchor that cannot be resolved is skipped on its own.
fn extract_links(page: &FetchedPage, requested: &Url) -> Vec<Link> {
    let base = Url::parse(&page.final_url).unwrap_or_else(|_| requested.clone());
    let document = Html::parse_document(&page.body);
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for element in document.select(&REL_NEXT) {
        if let Some(url) = element.value().attr("href").and_then(|h| resolve_href(&base, h)) {
            if seen.insert(url.clone()) {
                links.push(Link { url, pagination: true });
            }
        }
    }

    for element in document.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_href(&base, href) else {
            continue;
        };
        let rel_next = element
            .value()
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")));
        if seen.insert(url.clone()) {
            let pagination = rel_next || is_pagination_url(&url);
            links.push(Link { url, pagination });
        }
    }
    links
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    if !is_crawlable_href(href) {
        return None;
    }
    let url = resolve(base, href)?;
    (!normalize::should_skip_by_extension(url.as_str())).then_some(url)
}
