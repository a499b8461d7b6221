//! End-to-end curation run.
//!
//! ```text
//! Collector -> Deduplicator -> FilterEngine -> GroupScorer -> truncate -> output order
//! ```
//!
//! Network work (collection, optional summary fetches) happens in
//! [`Pipeline::run`]. Everything after collection is the synchronous,
//! deterministic [`curate_entries`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use curate_core::{CurateConfig, RunOptions, curate_site};
//!
//! # async fn example() -> curate_core::Result<()> {
//! let config = CurateConfig::new("https://example.com");
//! let result = curate_site(&config, &RunOptions::default()).await?;
//! for line in result.diagnostics.summary_lines() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::cancel::CancellationToken;
use crate::collector::Collector;
use crate::config::CurateConfig;
use crate::dedup::dedupe;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::filter::{FilterEngine, LanguageHints};
use crate::grouper::GroupScorer;
use crate::normalize::host_of;
use crate::politeness::HostThrottle;
use crate::summary::{HtmlSummarizer, Summarizer};
use crate::truncate::{order_for_output, resolve_profile, truncate};
use crate::types::{CuratedUrl, CurationResult, Diagnostics, FailedFetch, RawUrlEntry};
use crate::Result;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

/// Per-run options that sit outside the configuration file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Profile name (`minimal`, `recommended`, `full` or a configured one).
    pub profile: Option<String>,
    /// Keep only these groups in LLM outputs, replacing the profile's groups.
    pub only_groups: Option<Vec<String>>,
    /// Externally known page languages.
    pub language_hints: LanguageHints,
    /// Override `output.fetch_summaries`.
    pub fetch_summaries: Option<bool>,
}

impl RunOptions {
    /// Options selecting a profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Options restricting LLM output to some groups.
    #[must_use]
    pub fn with_only_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }
}

/// Curate already-collected entries.
///
/// Deduplicates, filters, groups, scores, truncates and orders. The result
/// only depends on the entries, their order for duplicate tie-breaks and the
/// configuration.
///
/// # Errors
///
/// Returns [`crate::Error::Config`] when a rule pattern does not compile.
pub fn curate_entries(
    config: &CurateConfig,
    entries: Vec<RawUrlEntry>,
    options: &RunOptions,
) -> Result<CurationResult> {
    let mut diagnostics = Diagnostics {
        discovered: entries.len(),
        ..Diagnostics::default()
    };
    for conflict in config.conflicts() {
        warn!(conflict = %conflict, "Configuration conflict");
        diagnostics.warnings.push(conflict.to_string());
    }

    let deduplicated = dedupe(entries);
    diagnostics.duplicates_removed = deduplicated.duplicates_removed;
    diagnostics.malformed = deduplicated.malformed;
    diagnostics.unique = deduplicated.entries.len();

    let engine = FilterEngine::from_config(config)?;
    let filtered = engine.filter(deduplicated.entries, &options.language_hints);
    diagnostics.excluded = filtered.excluded;
    diagnostics.non_default_language = filtered.non_default_language;
    diagnostics.malformed += filtered.malformed;

    let scorer = GroupScorer::from_filters(&config.filters);
    let mut urls: Vec<CuratedUrl> = Vec::with_capacity(filtered.items.len());
    for (mut url, verdict) in filtered.items {
        if scorer.score_and_group(&mut url, &verdict) {
            diagnostics.llms_excluded_groups += 1;
        }
        urls.push(url);
    }

    let mut plan = resolve_profile(&config.filters, options.profile.as_deref(), &mut diagnostics.warnings);
    if let Some(only) = &options.only_groups {
        plan = plan.with_only_groups(only);
    }
    diagnostics.truncated = truncate(&mut urls, &plan);

    urls.retain(|u| u.include_in_llms || u.include_in_sitemap);
    order_for_output(&mut urls, &scorer);

    diagnostics.final_llms = urls.iter().filter(|u| u.include_in_llms).count();
    diagnostics.final_sitemap = urls.iter().filter(|u| u.include_in_sitemap).count();
    debug!(
        final_llms = diagnostics.final_llms,
        final_sitemap = diagnostics.final_sitemap,
        "Curated entries"
    );
    Ok(CurationResult { urls, diagnostics })
}

/// A curation run over injected capabilities.
pub struct Pipeline<'a> {
    fetcher: &'a dyn PageFetcher,
    summarizer: &'a dyn Summarizer,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    /// Pipeline using `fetcher` for every request and `summarizer` for pages.
    #[must_use]
    pub const fn new(fetcher: &'a dyn PageFetcher, summarizer: &'a dyn Summarizer, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            summarizer,
            cancel,
        }
    }

    /// Collect, curate and summarize.
    ///
    /// # Errors
    ///
    /// Only whole-run conditions fail: an invalid base URL or rule pattern,
    /// [`crate::Error::EmptyCollection`], or cancellation before anything was
    /// collected. Everything else ends up in [`Diagnostics`].
    #[instrument(skip(self, config, options), fields(base_url = %config.site.base_url))]
    pub async fn run(&self, config: &CurateConfig, options: &RunOptions) -> Result<CurationResult> {
        let throttle = HostThrottle::new(config.crawl.politeness_delay());
        let collection = Collector::new(self.fetcher, &throttle, self.cancel.clone())
            .with_summarizer(self.summarizer)
            .collect(config)
            .await?;

        let mut result = curate_entries(config, collection.entries, options)?;
        let diagnostics = &mut result.diagnostics;
        diagnostics.off_domain = collection.off_domain;
        diagnostics.source_failures = collection.source_failures;
        diagnostics.page_failures = collection.page_failures;

        for url in &mut result.urls {
            if let Some(summary) = collection.summaries.get(&url.normalized_key) {
                url.title.clone_from(&summary.title);
                url.summary.clone_from(&summary.description);
            }
        }

        if options.fetch_summaries.unwrap_or(config.output.fetch_summaries) {
            let failures = self.fetch_missing_summaries(&mut result.urls, config, &throttle).await;
            result.diagnostics.page_failures.extend(failures);
        }

        result.diagnostics.cancelled = collection.cancelled || self.cancel.is_cancelled();
        info!(
            discovered = result.diagnostics.discovered,
            final_llms = result.diagnostics.final_llms,
            final_sitemap = result.diagnostics.final_sitemap,
            cancelled = result.diagnostics.cancelled,
            "Curation finished"
        );
        Ok(result)
    }

    /// Fetch and summarize LLM-bound URLs that have no summary yet.
    async fn fetch_missing_summaries(
        &self,
        urls: &mut [CuratedUrl],
        config: &CurateConfig,
        throttle: &HostThrottle,
    ) -> Vec<FailedFetch> {
        let targets: Vec<(usize, String)> = urls
            .iter()
            .enumerate()
            .filter(|(_, u)| u.include_in_llms && u.title.is_none() && u.summary.is_none())
            .map(|(idx, u)| (idx, u.url.clone()))
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }
        debug!(count = targets.len(), "Fetching page summaries");

        let fetched = stream::iter(targets)
            .map(|(idx, url)| async move {
                if self.cancel.is_cancelled() {
                    return (idx, url, None);
                }
                let host = host_of(&url).unwrap_or_default();
                let page = {
                    let _slot = throttle.acquire(&host).await;
                    self.fetcher.fetch(&url).await
                };
                let page = page.and_then(|p| p.error_for_status(&url));
                (idx, url, Some(page))
            })
            .buffered(config.crawl.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut failures = Vec::new();
        for (idx, url, page) in fetched {
            match page {
                Some(Ok(page)) => {
                    let summary = self.summarizer.summarize(&page);
                    urls[idx].title = summary.title;
                    urls[idx].summary = summary.description;
                },
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, category = e.category(), "Summary fetch failed");
                    failures.push(FailedFetch::from_error(url, &e));
                },
                None => {},
            }
        }
        failures
    }
}

/// Run the pipeline with the HTTP fetcher and HTML summarizer.
///
/// Crawl budgets from `crawl.max_duration_secs` and `crawl.max_pages` become
/// the run's cancellation token.
///
/// # Errors
///
/// See [`Pipeline::run`]; also fails when the HTTP client cannot be built.
pub async fn curate_site(config: &CurateConfig, options: &RunOptions) -> Result<CurationResult> {
    let fetcher = HttpFetcher::new(&config.crawl)?;
    let summarizer = HtmlSummarizer;
    Pipeline::new(&fetcher, &summarizer, config.crawl.cancellation_token())
        .run(config, options)
        .await
}
