//! Core data types flowing through the curation pipeline.
//!
//! A run starts with [`RawUrlEntry`] values emitted by the sources, collapses
//! them into one [`CuratedUrl`] per [`NormalizedKey`], and ends with a
//! [`CurationResult`] carrying the curated set plus [`Diagnostics`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of source that produced a raw URL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A `sitemap.xml` or sitemap index, remote or local.
    Sitemap,
    /// A page reached by the breadth-first crawler.
    Crawl,
    /// A sitemap discovered on a sibling subdomain.
    Subdomain,
    /// A URL listed verbatim in configuration or a list file.
    Static,
}

impl SourceKind {
    /// Stable lowercase name used in logs and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap",
            Self::Crawl => "crawl",
            Self::Subdomain => "subdomain",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL as emitted by one source, before deduplication.
///
/// ## Example
///
/// ```rust
/// use curate_core::{RawUrlEntry, SourceKind};
///
/// let entry = RawUrlEntry::new("https://example.com/docs", SourceKind::Crawl)
///     .with_priority(3)
///     .with_depth(1);
/// assert_eq!(entry.depth, 1);
/// assert_eq!(entry.source_priority, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUrlEntry {
    /// URL exactly as the source reported it.
    pub url: String,
    /// Which kind of source emitted this entry.
    pub source_kind: SourceKind,
    /// Priority of the emitting source; higher wins during deduplication.
    pub source_priority: i32,
    /// Crawl depth at which the URL was found (0 for non-crawl sources).
    pub depth: u32,
    /// `<lastmod>` reported by a sitemap, when present.
    pub discovered_lastmod: Option<DateTime<Utc>>,
}

impl RawUrlEntry {
    /// Create an entry with priority 0, depth 0 and no lastmod.
    #[must_use]
    pub fn new(url: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            url: url.into(),
            source_kind,
            source_priority: 0,
            depth: 0,
            discovered_lastmod: None,
        }
    }

    /// Set the source priority.
    #[must_use]
    pub const fn with_priority(mut self, source_priority: i32) -> Self {
        self.source_priority = source_priority;
        self
    }

    /// Set the crawl depth.
    #[must_use]
    pub const fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set the sitemap lastmod.
    #[must_use]
    pub const fn with_lastmod(mut self, lastmod: Option<DateTime<Utc>>) -> Self {
        self.discovered_lastmod = lastmod;
        self
    }
}

/// Canonical comparison key for a URL.
///
/// Only produced by [`crate::normalize::normalize`]. Used for deduplication
/// and visited-set lookups; the displayed URL always stays the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub(crate) const fn new(key: String) -> Self {
        Self(key)
    }

    /// Borrow the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A unique URL moving through filtering, grouping, scoring and truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedUrl {
    /// Original URL as reported by the winning source.
    pub url: String,
    /// Deduplication key.
    pub normalized_key: NormalizedKey,
    /// URL path (always starts with `/`).
    pub path: String,
    /// Detected content language, `None` when the URL carries no marker.
    pub language: Option<String>,
    /// Display group (e.g. "Products", "Docs").
    pub group: String,
    /// Explicit rule priority, 0 when no include rule set one.
    pub priority: i32,
    /// Deterministic importance score.
    pub score: i64,
    /// Page title, when a summary was extracted.
    pub title: Option<String>,
    /// Page description, when a summary was extracted.
    pub summary: Option<String>,
    /// Whether the URL belongs in `llms.txt` / `llms.json`.
    pub include_in_llms: bool,
    /// Whether the URL belongs in `sitemap.xml`.
    pub include_in_sitemap: bool,
    /// Source kind of the winning entry.
    pub source_kind: SourceKind,
    /// Crawl depth of the winning entry.
    pub depth: u32,
    /// `<lastmod>` of the winning entry.
    pub lastmod: Option<DateTime<Utc>>,
}

/// A fetch that failed during collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFetch {
    /// URL or path that failed.
    pub url: String,
    /// Failure message.
    pub reason: String,
    /// Error category (see [`crate::Error::category`]).
    pub category: String,
}

impl FailedFetch {
    /// Build a failure record from an error.
    #[must_use]
    pub fn from_error(url: impl Into<String>, error: &crate::Error) -> Self {
        Self {
            url: url.into(),
            reason: error.to_string(),
            category: error.category().to_string(),
        }
    }
}

/// Aggregate counts and failures observed during a run.
///
/// Failures never abort a run; they end up here instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Raw entries emitted by all sources.
    pub discovered: usize,
    /// Entries dropped because their URL could not be parsed.
    pub malformed: usize,
    /// Entries dropped because their host is outside the allowed domains.
    pub off_domain: usize,
    /// Entries merged into an already-seen normalized key.
    pub duplicates_removed: usize,
    /// Unique URLs after deduplication.
    pub unique: usize,
    /// URLs matched by an exclude rule.
    pub excluded: usize,
    /// URLs whose language differs from the default language.
    pub non_default_language: usize,
    /// URLs kept out of LLM outputs because their group is excluded.
    pub llms_excluded_groups: usize,
    /// URLs dropped from LLM outputs by profile, group or global limits.
    pub truncated: usize,
    /// URLs in the final LLM set.
    pub final_llms: usize,
    /// URLs in the final sitemap set.
    pub final_sitemap: usize,
    /// Sources that failed entirely.
    pub source_failures: Vec<FailedFetch>,
    /// Individual pages or child sitemaps that failed.
    pub page_failures: Vec<FailedFetch>,
    /// Non-fatal configuration conflicts and other warnings.
    pub warnings: Vec<String>,
    /// Whether the run stopped early on a cancellation signal.
    pub cancelled: bool,
}

impl Diagnostics {
    /// Render a short human-readable report.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("discovered: {}", self.discovered),
            format!("malformed: {}", self.malformed),
            format!("off domain: {}", self.off_domain),
            format!("duplicates removed: {}", self.duplicates_removed),
            format!("unique: {}", self.unique),
            format!("excluded by rules: {}", self.excluded),
            format!("non-default language: {}", self.non_default_language),
            format!("excluded groups: {}", self.llms_excluded_groups),
            format!("truncated: {}", self.truncated),
            format!("final llms: {}", self.final_llms),
            format!("final sitemap: {}", self.final_sitemap),
        ];
        if !self.source_failures.is_empty() {
            lines.push(format!("failed sources: {}", self.source_failures.len()));
        }
        if !self.page_failures.is_empty() {
            lines.push(format!("failed pages: {}", self.page_failures.len()));
        }
        for warning in &self.warnings {
            lines.push(format!("warning: {warning}"));
        }
        if self.cancelled {
            lines.push("run cancelled; results are partial".to_string());
        }
        lines
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurationResult {
    /// Curated URLs ordered by group weight, group name, then score.
    pub urls: Vec<CuratedUrl>,
    /// Counts and failures collected along the way.
    pub diagnostics: Diagnostics,
}

impl CurationResult {
    /// URLs destined for `llms.txt` / `llms.json`, in output order.
    pub fn llms_urls(&self) -> impl Iterator<Item = &CuratedUrl> {
        self.urls.iter().filter(|u| u.include_in_llms)
    }

    /// URLs destined for `sitemap.xml`, in output order.
    pub fn sitemap_urls(&self) -> impl Iterator<Item = &CuratedUrl> {
        self.urls.iter().filter(|u| u.include_in_sitemap)
    }

    /// Distinct groups of the LLM set, in output order.
    #[must_use]
    pub fn llms_groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for url in self.llms_urls() {
            if !groups.contains(&url.group.as_str()) {
                groups.push(&url.group);
            }
        }
        groups
    }
}
