//! Configuration for a curation run.
//!
//! The configuration is a plain serde data model. It is normally loaded from
//! TOML, but callers may also build it in code; every section except
//! `site.base_url` has a default.
//!
//! ## Example
//!
//! ```toml
//! [site]
//! base_url = "https://example.com"
//! default_language = "en"
//!
//! [[sources]]
//! type = "sitemap"
//! url = "https://example.com/sitemap.xml"
//!
//! [[sources]]
//! type = "crawl"
//! url = "https://example.com/"
//! max_depth = 2
//!
//! [filters]
//! max_urls = 300
//! exclude = [{ pattern = "blog" }]
//! include = [{ pattern = "^/products/", group = "Products", priority = 5 }]
//!
//! [filters.group_limits]
//! Docs = 40
//! ```
//!
//! Schema-level validation is left to serde. The only semantic check is
//! [`CurateConfig::conflicts`], which reports settings that can never take
//! effect without failing the run.

use crate::cancel::CancellationToken;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Root configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurateConfig {
    /// Site identity and domain policy.
    pub site: SiteConfig,
    /// URL sources in declaration order. Empty means "synthesize defaults".
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Filtering, grouping and truncation settings.
    #[serde(default)]
    pub filters: FiltersConfig,
    /// Network behaviour of the crawler and sitemap reader.
    #[serde(default)]
    pub crawl: CrawlConfig,
    /// Output selection flags.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Site identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute base URL of the site, e.g. `https://example.com`.
    pub base_url: String,
    /// Language kept in LLM outputs.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Hosts whose URLs are kept. Defaults to the base URL host.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Site description rendered at the top of `llms.txt`.
    #[serde(default)]
    pub description: Option<String>,
    /// Discover sibling subdomains and add their sitemaps as sources.
    #[serde(default)]
    pub auto_subdomains: bool,
    /// Explicit subdomains to add instead of running live discovery.
    #[serde(default)]
    pub selected_subdomains: Option<Vec<String>>,
}

fn default_language() -> String {
    "en".to_string()
}

/// One configured URL source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// A remote sitemap URL or a local sitemap file path.
    Sitemap {
        /// URL or filesystem path of the sitemap.
        url: String,
        /// Explicit priority; overrides declaration order.
        #[serde(default)]
        weight: Option<i32>,
    },
    /// A breadth-first crawl from an entry URL.
    Crawl {
        /// Entry URL.
        url: String,
        /// Maximum link depth from the entry URL.
        #[serde(default = "default_max_depth")]
        max_depth: u32,
        /// Maximum pages emitted by this source; 0 falls back to `filters.max_urls`.
        #[serde(default)]
        max_urls: usize,
        /// Explicit priority; overrides declaration order.
        #[serde(default)]
        weight: Option<i32>,
    },
    /// URLs listed inline and/or in a newline-separated file.
    Static {
        /// Inline URL list.
        #[serde(default)]
        urls: Vec<String>,
        /// Single URL shorthand.
        #[serde(default)]
        url: Option<String>,
        /// Path to a file with one URL per line (`#` starts a comment).
        #[serde(default)]
        path: Option<PathBuf>,
        /// Explicit priority; overrides declaration order.
        #[serde(default)]
        weight: Option<i32>,
    },
}

const fn default_max_depth() -> u32 {
    2
}

impl SourceConfig {
    /// Sitemap source with no explicit weight.
    #[must_use]
    pub fn sitemap(url: impl Into<String>) -> Self {
        Self::Sitemap {
            url: url.into(),
            weight: None,
        }
    }

    /// Crawl source with default limits.
    #[must_use]
    pub fn crawl(url: impl Into<String>, max_depth: u32) -> Self {
        Self::Crawl {
            url: url.into(),
            max_depth,
            max_urls: 0,
            weight: None,
        }
    }

    /// Static source from an inline list.
    #[must_use]
    pub fn static_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Static {
            urls: urls.into_iter().map(Into::into).collect(),
            url: None,
            path: None,
            weight: None,
        }
    }

    /// Explicit weight, if configured.
    #[must_use]
    pub const fn weight(&self) -> Option<i32> {
        match self {
            Self::Sitemap { weight, .. }
            | Self::Crawl { weight, .. }
            | Self::Static { weight, .. } => *weight,
        }
    }

    /// Short label used in logs and failure records.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Sitemap { url, .. } | Self::Crawl { url, .. } => url.clone(),
            Self::Static { path, url, urls, .. } => path.as_ref().map_or_else(
                || url.clone().unwrap_or_else(|| format!("static list ({})", urls.len())),
                |p| p.display().to_string(),
            ),
        }
    }
}

/// A regex rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regular expression matched against the URL path (plus `?query`).
    pub pattern: String,
    /// Group assigned by an include rule.
    #[serde(default)]
    pub group: Option<String>,
    /// Priority assigned by an include rule.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl RuleConfig {
    /// Rule with only a pattern.
    #[must_use]
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            group: None,
            priority: None,
        }
    }

    /// Set the group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A named truncation preset defined in configuration.
///
/// Fields left unset inherit from the built-in preset of the same name, or
/// from the base filter settings for custom profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Groups kept by this profile; `"*"` or empty keeps every group.
    #[serde(default)]
    pub include_groups: Vec<String>,
    /// Global cap for this profile.
    #[serde(default)]
    pub max_urls: Option<usize>,
    /// Per-group caps for this profile.
    #[serde(default)]
    pub group_limits: BTreeMap<String, usize>,
    /// Cap for groups without an explicit entry.
    #[serde(default)]
    pub default_group_limit: Option<usize>,
}

/// Filtering, grouping and truncation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Include rules, first match wins.
    pub include: Vec<RuleConfig>,
    /// Exclude rules, any match excludes.
    pub exclude: Vec<RuleConfig>,
    /// Global cap on URLs in LLM outputs.
    pub max_urls: usize,
    /// Derive groups from the first path segment.
    pub auto_group: bool,
    /// Named truncation presets.
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Per-group caps.
    pub group_limits: BTreeMap<String, usize>,
    /// Cap for groups without an explicit entry; `None` means unlimited.
    pub default_group_limit: Option<usize>,
    /// Prepend the built-in noise exclude rules.
    pub use_default_excludes: bool,
    /// Groups kept out of LLM outputs (still in the sitemap).
    pub llms_exclude_groups: Vec<String>,
    /// Overrides for the per-group base weights used in scoring.
    pub group_weights: BTreeMap<String, i64>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_urls: 2000,
            auto_group: true,
            profiles: BTreeMap::new(),
            group_limits: BTreeMap::new(),
            default_group_limit: None,
            use_default_excludes: true,
            llms_exclude_groups: Vec::new(),
            group_weights: BTreeMap::new(),
        }
    }
}

/// Network behaviour of the crawler and sitemap reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum concurrent page fetches.
    pub concurrency: usize,
    /// Minimum spacing between requests to the same host, in milliseconds.
    pub politeness_delay_ms: u64,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Retries for rate-limited or failing requests.
    pub max_retries: u32,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Total page-fetch budget for the run; 0 is unbounded.
    pub max_pages: usize,
    /// Wall-clock budget for the run in seconds; 0 is unbounded.
    pub max_duration_secs: u64,
    /// Maximum pagination links followed per crawl.
    pub max_pagination_pages: usize,
    /// Maximum sitemap-index nesting.
    pub sitemap_max_depth: u32,
    /// Admit hosts under the same root domain while crawling.
    pub allow_subdomains: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            politeness_delay_ms: 250,
            request_timeout_secs: 20,
            max_retries: 2,
            user_agent: concat!("curate/", env!("CARGO_PKG_VERSION")).to_string(),
            max_pages: 0,
            max_duration_secs: 0,
            max_pagination_pages: 50,
            sitemap_max_depth: 5,
            allow_subdomains: false,
        }
    }
}

/// Output selection flags.
///
/// File names are carried for the caller that writes files; the renderers in
/// [`crate::output`] only produce strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `llms.txt` file name.
    pub llms_txt: Option<String>,
    /// `llms-full.txt` file name.
    pub llms_full_txt: Option<String>,
    /// `llms.json` file name.
    pub llms_json: Option<String>,
    /// `sitemap.xml` file name.
    pub sitemap_xml: Option<String>,
    /// `sitemap_index.xml` file name.
    pub sitemap_index: Option<String>,
    /// Restrict `sitemap.xml` to URLs that survive the exclude rules.
    pub sitemap_apply_filters: bool,
    /// Fetch pages of the final LLM set to extract titles and summaries.
    pub fetch_summaries: bool,
}

impl CrawlConfig {
    /// Minimum spacing between requests to one host.
    #[must_use]
    pub const fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    /// Cancellation token carrying the `max_duration_secs` and `max_pages`
    /// budgets (0 disables either).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken::with_limits(
            (self.max_duration_secs > 0).then(|| Duration::from_secs(self.max_duration_secs)),
            (self.max_pages > 0).then_some(self.max_pages),
        )
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            llms_txt: Some("llms.txt".to_string()),
            llms_full_txt: None,
            llms_json: None,
            sitemap_xml: None,
            sitemap_index: None,
            sitemap_apply_filters: false,
            fetch_summaries: false,
        }
    }
}

impl CurateConfig {
    /// Minimal configuration for a base URL; every other setting is default.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            site: SiteConfig {
                base_url: base_url.into(),
                default_language: default_language(),
                allowed_domains: Vec::new(),
                description: None,
                auto_subdomains: false,
                selected_subdomains: None,
            },
            sources: Vec::new(),
            filters: FiltersConfig::default(),
            crawl: CrawlConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid TOML or a missing `site.base_url`.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.base_url()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `site.base_url` is not an absolute URL.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.site.base_url.trim())
            .map_err(|e| Error::Config(format!("Invalid site.base_url: {e}")))?;
        if url.host_str().is_none() {
            return Err(Error::Config(
                "Invalid site.base_url: missing host".to_string(),
            ));
        }
        Ok(url)
    }

    /// Base URL host, lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the base URL is invalid.
    pub fn base_host(&self) -> Result<String> {
        let url = self.base_url()?;
        Ok(url.host_str().unwrap_or_default().to_ascii_lowercase())
    }

    /// Effective allowed hosts: the configured list, or the base host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the base URL is invalid.
    pub fn allowed_domains(&self) -> Result<BTreeSet<String>> {
        if self.site.allowed_domains.is_empty() {
            return Ok(BTreeSet::from([self.base_host()?]));
        }
        Ok(self
            .site
            .allowed_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect())
    }

    /// Report settings that can never take effect.
    ///
    /// Every returned error is [`Error::ConfigurationConflict`]; the caller
    /// logs them and continues.
    #[must_use]
    pub fn conflicts(&self) -> Vec<Error> {
        let mut conflicts = Vec::new();

        let producible = crate::grouper::producible_groups(&self.filters);
        let limit_sources = std::iter::once(("filters.group_limits", &self.filters.group_limits))
            .chain(
                self.filters
                    .profiles
                    .values()
                    .map(|p| ("filters.profiles.*.group_limits", &p.group_limits)),
            );
        for (origin, limits) in limit_sources {
            for group in limits.keys().filter(|g| !producible.contains(g.as_str())) {
                conflicts.push(Error::ConfigurationConflict(format!(
                    "group '{group}' in {origin} is never produced by any rule or category"
                )));
            }
        }

        for (name, profile) in &self.filters.profiles {
            if profile.include_groups.iter().any(|g| g == "*") && profile.include_groups.len() > 1
            {
                conflicts.push(Error::ConfigurationConflict(format!(
                    "profile '{name}' lists '*' together with explicit groups"
                )));
            }
        }

        for source in &self.sources {
            if let SourceConfig::Static { urls, url, path, .. } = source {
                if urls.is_empty() && url.is_none() && path.is_none() {
                    conflicts.push(Error::ConfigurationConflict(
                        "static source has neither urls, url nor path".to_string(),
                    ));
                }
            }
        }

        conflicts
    }
}
