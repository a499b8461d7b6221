//! Site analysis and configuration recommendation.
//!
//! [`SiteAnalyzer::analyze`] looks at a site before any configuration exists:
//!
//! 1. `/sitemap.xml`, `/sitemap_index.xml` and the sitemaps declared in
//!    robots.txt are tried in order; the first readable one wins
//! 2. top-level sections are detected from the sitemap's first path
//!    segments, and the common section paths still missing are checked
//! 3. sibling subdomains are discovered when a sitemap exists
//!
//! [`SiteAnalysis::recommend`] turns the findings into a [`CurateConfig`]
//! with sources, include rules and a suggested profile.

use crate::cancel::CancellationToken;
use crate::config::{CrawlConfig, CurateConfig, RuleConfig, SourceConfig};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::grouper::category_for_segment;
use crate::politeness::{HostThrottle, ThrottledFetcher};
use crate::sitemap::{SitemapReader, fetch_robots_sitemaps};
use crate::subdomain::SubdomainDiscovery;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};
use url::Url;

/// Sections worth a dedicated crawl, with the paths checked for each.
const SECTION_PATHS: &[(&str, &[&str])] = &[
    ("Blog", &["/blog", "/news", "/articles"]),
    ("Docs", &["/docs", "/documentation", "/help", "/guide", "/api"]),
    ("Products", &["/products", "/product", "/solutions", "/features"]),
    ("Pricing", &["/pricing", "/plans", "/pricing-plans"]),
    ("About", &["/about", "/about-us", "/company"]),
    ("Support", &["/contact", "/support"]),
    ("Legal", &["/legal", "/privacy", "/terms", "/cookies"]),
    ("Careers", &["/careers", "/jobs", "/hiring", "/work-with-us"]),
];

/// Groups that get an include rule, highest rule priority first.
const RULE_PRIORITIES: &[(&str, i32)] = &[("Products", 4), ("Pricing", 3), ("Docs", 2), ("Blog", 1)];

/// Sites with more sitemap pages than this get the `recommended` profile.
const FULL_PROFILE_MAX_PAGES: usize = 500;

/// A detected top-level section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Group the section maps to.
    pub group: String,
    /// Section root path, e.g. `/docs`.
    pub path: String,
    /// Absolute section root URL.
    pub url: String,
    /// Whether the section was seen in the sitemap rather than found by a path check.
    pub from_sitemap: bool,
}

impl Section {
    /// Crawl depth and page cap suited to the section.
    #[must_use]
    pub fn crawl_limits(&self) -> (u32, usize) {
        match self.group.as_str() {
            "Docs" => (5, 1000),
            "Blog" => (3, 500),
            _ => (2, 200),
        }
    }
}

/// What analysis found about a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteAnalysis {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Base host, lower-cased.
    pub host: String,
    /// Sitemap that answered, if any.
    pub sitemap_urls: Vec<String>,
    /// URLs listed by that sitemap.
    pub estimated_pages: usize,
    /// Sections in section table order.
    pub sections: Vec<Section>,
    /// Sibling subdomains sharing the root domain.
    pub subdomains: Vec<String>,
}

/// A recommended configuration plus the profile to run it with.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Ready-to-use configuration.
    pub config: CurateConfig,
    /// Suggested profile name.
    pub profile: String,
}

impl SiteAnalysis {
    /// Whether a sitemap was found.
    #[must_use]
    pub fn has_sitemap(&self) -> bool {
        !self.sitemap_urls.is_empty()
    }

    /// Detected section for a group.
    #[must_use]
    pub fn section(&self, group: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.group == group)
    }

    /// Build a configuration from the findings.
    ///
    /// Sources are the sitemap, one crawl per section (a base crawl when no
    /// sitemap exists) and the sitemaps of discovered subdomains. Products,
    /// Pricing, Docs and Blog sections get include rules in that priority
    /// order.
    #[must_use]
    pub fn recommend(&self) -> Recommendation {
        let mut config = CurateConfig::new(self.base_url.clone());
        config.site.allowed_domains.push(self.host.clone());

        config
            .sources
            .extend(self.sitemap_urls.iter().map(SourceConfig::sitemap));
        for section in &self.sections {
            let (max_depth, max_urls) = section.crawl_limits();
            config.sources.push(SourceConfig::Crawl {
                url: section.url.clone(),
                max_depth,
                max_urls,
                weight: None,
            });
        }
        if !self.has_sitemap() {
            config.sources.push(SourceConfig::Crawl {
                url: self.base_url.clone(),
                max_depth: 3,
                max_urls: 1000,
                weight: None,
            });
        }

        let scheme = Url::parse(&self.base_url).map_or_else(|_| "https".to_string(), |u| u.scheme().to_string());
        for subdomain in self.subdomains.iter().filter(|s| **s != self.host) {
            config.site.allowed_domains.push(subdomain.clone());
            config
                .sources
                .push(SourceConfig::sitemap(format!("{scheme}://{subdomain}/sitemap.xml")));
        }

        config.filters.include = RULE_PRIORITIES
            .iter()
            .filter_map(|(group, priority)| {
                self.section(group).map(|section| {
                    RuleConfig::pattern(format!("^{}", regex::escape(&section.path)))
                        .with_group(*group)
                        .with_priority(*priority)
                })
            })
            .collect();

        let profile = if self.estimated_pages > FULL_PROFILE_MAX_PAGES {
            "recommended"
        } else {
            "full"
        };
        Recommendation {
            config,
            profile: profile.to_string(),
        }
    }
}

/// Sections visible in sitemap URLs on the base host.
///
/// Only the first path segment counts, so locale-prefixed variants do not
/// produce sections of their own.
fn sections_from_sitemap<'u>(urls: impl IntoIterator<Item = &'u str>, origin: &str, host: &str) -> Vec<Section> {
    let mut found: BTreeMap<&'static str, String> = BTreeMap::new();
    for raw in urls {
        let Ok(url) = Url::parse(raw) else {
            continue;
        };
        if !url.host_str().is_some_and(|h| h.eq_ignore_ascii_case(host)) {
            continue;
        }
        let Some(segment) = url.path_segments().and_then(|mut s| s.next()).filter(|s| !s.is_empty()) else {
            continue;
        };
        let Some(group) = category_for_segment(segment) else {
            continue;
        };
        found.entry(group).or_insert_with(|| format!("/{}", segment.to_ascii_lowercase()));
    }

    SECTION_PATHS
        .iter()
        .filter_map(|(group, _)| {
            found.get(group).map(|path| Section {
                group: (*group).to_string(),
                path: path.clone(),
                url: format!("{origin}{path}"),
                from_sitemap: true,
            })
        })
        .collect()
}

/// Analyzes a site through a [`PageFetcher`], paced by a [`HostThrottle`].
pub struct SiteAnalyzer<'a> {
    fetcher: ThrottledFetcher<'a>,
    raw_fetcher: &'a dyn PageFetcher,
    throttle: &'a HostThrottle,
    cancel: CancellationToken,
    sitemap_max_depth: u32,
}

impl<'a> SiteAnalyzer<'a> {
    /// Analyzer over the given capabilities.
    #[must_use]
    pub const fn new(
        fetcher: &'a dyn PageFetcher,
        throttle: &'a HostThrottle,
        cancel: CancellationToken,
        sitemap_max_depth: u32,
    ) -> Self {
        Self {
            fetcher: ThrottledFetcher::new(fetcher, throttle),
            raw_fetcher: fetcher,
            throttle,
            cancel,
            sitemap_max_depth,
        }
    }

    /// Analyze the site at `base_url`.
    ///
    /// Every lookup is best-effort; a site that answers nothing yields an
    /// analysis with no sitemap and no sections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `base_url` is not an absolute URL.
    #[instrument(skip(self))]
    pub async fn analyze(&self, base_url: &str) -> Result<SiteAnalysis> {
        let base = Url::parse(base_url.trim()).map_err(|e| Error::Config(format!("Invalid base URL: {e}")))?;
        let Some(host) = base.host_str().map(str::to_ascii_lowercase) else {
            return Err(Error::Config("Invalid base URL: missing host".to_string()));
        };
        let origin = base.origin().ascii_serialization();

        let mut analysis = SiteAnalysis {
            base_url: base.as_str().trim_end_matches('/').to_string(),
            host: host.clone(),
            sitemap_urls: Vec::new(),
            estimated_pages: 0,
            sections: Vec::new(),
            subdomains: Vec::new(),
        };

        let sitemap_urls = self.find_sitemap(&base, &origin, &mut analysis).await;
        let mut sections = sections_from_sitemap(sitemap_urls.iter().map(String::as_str), &origin, &host);
        for (group, paths) in SECTION_PATHS {
            if sections.iter().any(|s| s.group == *group) {
                continue;
            }
            if let Some(section) = self.check_section(group, paths, &origin).await {
                sections.push(section);
            }
        }
        let order = |s: &Section| SECTION_PATHS.iter().position(|(g, _)| *g == s.group);
        sections.sort_by_key(order);
        for section in &sections {
            info!(group = %section.group, url = %section.url, from_sitemap = section.from_sitemap, "Detected section");
        }
        analysis.sections = sections;

        if analysis.has_sitemap() && !self.cancel.is_cancelled() {
            analysis.subdomains =
                SubdomainDiscovery::new(self.raw_fetcher, self.throttle, self.cancel.clone(), self.sitemap_max_depth)
                    .discover_live(&base)
                    .await;
        }

        info!(
            has_sitemap = analysis.has_sitemap(),
            pages = analysis.estimated_pages,
            sections = analysis.sections.len(),
            subdomains = analysis.subdomains.len(),
            "Site analysis complete"
        );
        Ok(analysis)
    }

    /// Read the first sitemap that answers and return its URLs.
    async fn find_sitemap(&self, base: &Url, origin: &str, analysis: &mut SiteAnalysis) -> Vec<String> {
        let reader = SitemapReader::new(&self.fetcher, self.cancel.clone()).with_max_depth(self.sitemap_max_depth);
        let mut candidates = vec![format!("{origin}/sitemap.xml"), format!("{origin}/sitemap_index.xml")];
        let mut robots_checked = false;

        while !candidates.is_empty() {
            for location in std::mem::take(&mut candidates) {
                if self.cancel.is_cancelled() {
                    return Vec::new();
                }
                match reader.read(&location).await {
                    Ok(read) => {
                        info!(url = %location, pages = read.entries.len(), "Found sitemap");
                        analysis.sitemap_urls.push(location);
                        analysis.estimated_pages = read.entries.len();
                        return read.entries.into_iter().map(|e| e.url).collect();
                    },
                    Err(e) => debug!(url = %location, error = %e, "No sitemap here"),
                }
            }
            if !robots_checked {
                robots_checked = true;
                candidates = fetch_robots_sitemaps(&self.fetcher, base).await;
            }
        }
        Vec::new()
    }

    /// First path of a section that answers with a success status.
    async fn check_section(&self, group: &str, paths: &[&str], origin: &str) -> Option<Section> {
        for path in paths {
            if self.cancel.is_cancelled() {
                return None;
            }
            let url = format!("{origin}{path}");
            match self.fetcher.fetch(&url).await {
                Ok(page) if page.is_success() => {
                    return Some(Section {
                        group: group.to_string(),
                        path: (*path).to_string(),
                        url,
                        from_sitemap: false,
                    });
                },
                Ok(page) => debug!(url = %url, status = page.status, "Section path missing"),
                Err(e) => debug!(url = %url, error = %e, "Section path check failed"),
            }
        }
        None
    }
}

/// Analyze a live site over HTTP and recommend a configuration.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid base URL and
/// [`Error::Network`] when the HTTP client cannot be built.
pub async fn recommend_config(base_url: &str) -> Result<(SiteAnalysis, Recommendation)> {
    let crawl = CrawlConfig::default();
    let fetcher = HttpFetcher::new(&crawl)?;
    let throttle = HostThrottle::new(crawl.politeness_delay());
    let analysis = SiteAnalyzer::new(&fetcher, &throttle, crawl.cancellation_token(), crawl.sitemap_max_depth)
        .analyze(base_url)
        .await?;
    let recommendation = analysis.recommend();
    Ok((analysis, recommendation))
}
