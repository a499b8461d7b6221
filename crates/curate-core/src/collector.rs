//! Source orchestration.
//!
//! The collector turns the configured sources into one stream of
//! [`RawUrlEntry`] values:
//!
//! 1. With no sources configured, a `/sitemap.xml` source and a homepage
//!    crawl are synthesized from `site.base_url`.
//! 2. With `site.auto_subdomains`, discovered sibling subdomains are appended
//!    as extra sitemap sources.
//! 3. Sources run in declaration order. A failing source is recorded and
//!    skipped.
//! 4. When every sitemap source came back empty, sitemaps declared in
//!    robots.txt are read instead.
//! 5. Entries on hosts outside the allowed domains are dropped.
//!
//! Source priority is `count - index` (earlier sources win duplicates)
//! unless the source sets an explicit `weight`.

use crate::cancel::CancellationToken;
use crate::config::{CurateConfig, SourceConfig};
use crate::crawler::{CrawlRequest, Crawler};
use crate::fetch::PageFetcher;
use crate::normalize::{HostAllowList, host_of, root_domain_from_host};
use crate::politeness::{HostThrottle, ThrottledFetcher};
use crate::sitemap::{SitemapReader, fetch_robots_sitemaps};
use crate::subdomain::{self, SubdomainDiscovery};
use crate::summary::{PageSummary, Summarizer};
use crate::types::{FailedFetch, NormalizedKey, RawUrlEntry, SourceKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Everything the sources produced.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Raw entries in source order.
    pub entries: Vec<RawUrlEntry>,
    /// Summaries captured while crawling.
    pub summaries: HashMap<NormalizedKey, PageSummary>,
    /// Sources that failed as a whole.
    pub source_failures: Vec<FailedFetch>,
    /// Pages or child sitemaps that failed inside a source.
    pub page_failures: Vec<FailedFetch>,
    /// Entries dropped because their host is not allowed.
    pub off_domain: usize,
    /// Subdomains added as sources.
    pub subdomains: Vec<String>,
    /// Whether collection stopped early on cancellation.
    pub cancelled: bool,
}

/// A source with its resolved priority and kind.
#[derive(Debug, Clone)]
struct PlannedSource {
    source: SourceConfig,
    kind: SourceKind,
    priority: i32,
}

/// Runs configured sources through the sitemap reader, crawler and static
/// list reader.
pub struct Collector<'a> {
    fetcher: &'a dyn PageFetcher,
    throttle: &'a HostThrottle,
    cancel: CancellationToken,
    summarizer: Option<&'a dyn Summarizer>,
}

impl<'a> Collector<'a> {
    /// Collector over the given capabilities.
    #[must_use]
    pub const fn new(fetcher: &'a dyn PageFetcher, throttle: &'a HostThrottle, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            throttle,
            cancel,
            summarizer: None,
        }
    }

    /// Summarize crawled pages on the fly.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: &'a dyn Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Collect raw entries for a configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when `site.base_url` is invalid
    /// - [`Error::Cancelled`] when cancellation hit before anything was found
    /// - [`Error::EmptyCollection`] when no source produced a single URL
    #[instrument(skip(self, config), fields(base_url = %config.site.base_url))]
    pub async fn collect(&self, config: &CurateConfig) -> Result<Collection> {
        let base = config.base_url()?;
        let mut allowed = HostAllowList::new(config.allowed_domains()?, config.crawl.allow_subdomains);
        let mut collection = Collection::default();

        let mut sources = plan_sources(config, &base);
        if config.site.auto_subdomains {
            let discovered = self.discover_subdomains(config, &base).await;
            for host in &discovered {
                allowed.insert(host);
                sources.push(PlannedSource {
                    source: SourceConfig::sitemap(format!("{}://{host}/sitemap.xml", base.scheme())),
                    kind: SourceKind::Subdomain,
                    priority: 0,
                });
            }
            collection.subdomains = discovered;
        }

        let mut sitemap_sources = 0;
        let mut sitemap_entries = 0;
        for planned in &sources {
            if self.cancel.is_cancelled() {
                info!("Collection cancelled; keeping entries gathered so far");
                break;
            }
            if matches!(planned.source, SourceConfig::Sitemap { .. }) {
                sitemap_sources += 1;
            }
            let before = collection.entries.len();
            self.run_source(config, &base, &allowed, planned, &mut collection).await;
            if matches!(planned.source, SourceConfig::Sitemap { .. }) {
                sitemap_entries += collection.entries.len() - before;
            }
        }

        if sitemap_sources > 0 && sitemap_entries == 0 && !self.cancel.is_cancelled() {
            self.read_robots_sitemaps(config, &base, &mut collection).await;
        }

        let before = collection.entries.len();
        collection
            .entries
            .retain(|entry| host_of(&entry.url).is_none_or(|host| allowed.allows(&host)));
        collection.off_domain = before - collection.entries.len();
        if collection.off_domain > 0 {
            debug!(dropped = collection.off_domain, "Dropped entries outside allowed domains");
        }

        collection.cancelled = self.cancel.is_cancelled();
        info!(
            entries = collection.entries.len(),
            failed_sources = collection.source_failures.len(),
            failed_pages = collection.page_failures.len(),
            "Collection finished"
        );

        if collection.entries.is_empty() {
            if collection.cancelled {
                return Err(Error::Cancelled(
                    "cancelled before any URL was collected".to_string(),
                ));
            }
            return Err(Error::EmptyCollection);
        }
        Ok(collection)
    }

    async fn discover_subdomains(&self, config: &CurateConfig, base: &Url) -> Vec<String> {
        let candidates = SubdomainDiscovery::new(
            self.fetcher,
            self.throttle,
            self.cancel.clone(),
            config.crawl.sitemap_max_depth,
        )
            .discover_live(base)
            .await;
        let root_domain = root_domain_from_host(base.host_str().unwrap_or_default());
        subdomain::select(candidates, config.site.selected_subdomains.as_deref(), &root_domain)
    }

    async fn run_source(
        &self,
        config: &CurateConfig,
        base: &Url,
        allowed: &HostAllowList,
        planned: &PlannedSource,
        collection: &mut Collection,
    ) {
        let label = planned.source.label();
        debug!(source = %label, kind = %planned.kind, priority = planned.priority, "Running source");
        match &planned.source {
            SourceConfig::Sitemap { url, .. } => {
                let fetcher = ThrottledFetcher::new(self.fetcher, self.throttle);
                let reader = SitemapReader::new(&fetcher, self.cancel.clone())
                    .with_max_depth(config.crawl.sitemap_max_depth)
                    .with_source(planned.kind, planned.priority);
                match reader.read(&resolve_location(base, url)).await {
                    Ok(read) => {
                        collection.entries.extend(read.entries);
                        collection.page_failures.extend(read.failures);
                    },
                    Err(e) => record_source_failure(collection, &label, &e),
                }
            },
            SourceConfig::Crawl {
                url,
                max_depth,
                max_urls,
                ..
            } => {
                let limit = if *max_urls > 0 { *max_urls } else { config.filters.max_urls };
                let mut crawler = Crawler::new(self.fetcher, self.throttle, self.cancel.clone(), &config.crawl, allowed.clone());
                if let Some(summarizer) = self.summarizer {
                    crawler = crawler.with_summarizer(summarizer);
                }
                let request = CrawlRequest::new(resolve_location(base, url), *max_depth)
                    .with_max_urls(limit)
                    .with_priority(planned.priority);
                let outcome = crawler.crawl(&request).await;
                if outcome.entries.is_empty() && !outcome.failures.is_empty() {
                    let reason = outcome
                        .failures
                        .first()
                        .map(|f| f.reason.clone())
                        .unwrap_or_default();
                    record_source_failure(
                        collection,
                        &label,
                        &Error::SourceFetch {
                            source_name: label.clone(),
                            reason,
                        },
                    );
                }
                collection.entries.extend(outcome.entries);
                collection.page_failures.extend(outcome.failures);
                collection.summaries.extend(outcome.summaries);
            },
            SourceConfig::Static { urls, url, path, .. } => {
                let mut listed: Vec<String> = urls.iter().chain(url.iter()).cloned().collect();
                if let Some(path) = path {
                    match read_url_list(path).await {
                        Ok(from_file) => listed.extend(from_file),
                        Err(e) => record_source_failure(collection, &label, &e),
                    }
                }
                collection.entries.extend(listed.iter().map(|u| {
                    RawUrlEntry::new(resolve_location(base, u), SourceKind::Static).with_priority(planned.priority)
                }));
            },
        }
    }

    async fn read_robots_sitemaps(&self, config: &CurateConfig, base: &Url, collection: &mut Collection) {
        let fetcher = ThrottledFetcher::new(self.fetcher, self.throttle);
        let declared = fetch_robots_sitemaps(&fetcher, base).await;
        if declared.is_empty() {
            return;
        }
        info!(count = declared.len(), "Sitemap sources were empty; reading robots.txt sitemaps");
        let reader = SitemapReader::new(&fetcher, self.cancel.clone())
            .with_max_depth(config.crawl.sitemap_max_depth);
        for location in declared {
            match reader.read(&location).await {
                Ok(read) => {
                    collection.entries.extend(read.entries);
                    collection.page_failures.extend(read.failures);
                },
                Err(e) => record_source_failure(collection, &location, &e),
            }
        }
    }
}

fn record_source_failure(collection: &mut Collection, label: &str, error: &Error) {
    warn!(source = %label, error = %error, category = error.category(), "Source failed; skipping");
    collection.source_failures.push(FailedFetch::from_error(label, error));
}

/// Configured sources with priorities, or the synthesized defaults.
fn plan_sources(config: &CurateConfig, base: &Url) -> Vec<PlannedSource> {
    let sources = if config.sources.is_empty() {
        let origin = base.origin().ascii_serialization();
        debug!("No sources configured; using sitemap and homepage crawl");
        vec![
            SourceConfig::sitemap(format!("{origin}/sitemap.xml")),
            SourceConfig::crawl(base.as_str(), 2),
        ]
    } else {
        config.sources.clone()
    };

    let count = i32::try_from(sources.len()).unwrap_or(i32::MAX);
    sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| {
            let kind = match source {
                SourceConfig::Sitemap { .. } => SourceKind::Sitemap,
                SourceConfig::Crawl { .. } => SourceKind::Crawl,
                SourceConfig::Static { .. } => SourceKind::Static,
            };
            let priority = source
                .weight()
                .unwrap_or_else(|| count - i32::try_from(index).unwrap_or(count));
            PlannedSource { source, kind, priority }
        })
        .collect()
}

/// Resolve a site-relative reference (`/sitemap.xml`) against the base URL.
///
/// Absolute URLs and filesystem paths are returned unchanged. A reference is
/// site-relative when it starts with `/` and no such file exists locally.
fn resolve_location(base: &Url, location: &str) -> String {
    let location = location.trim();
    if location.starts_with('/') && !Path::new(location).exists() {
        if let Ok(joined) = base.join(location) {
            return joined.into();
        }
    }
    location.to_string()
}

/// Read a newline-separated URL list; blank lines and `#` comments are skipped.
async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}
