//! Rule-based filtering and language detection.
//!
//! Rules are compiled once into an ordered list of [`FilterRule`]s. Each
//! unique URL is matched against them and receives a [`Verdict`]:
//!
//! - any exclude rule matching wins and yields [`Verdict::Excluded`]
//! - otherwise the first matching include rule yields [`Verdict::Included`]
//! - otherwise [`Verdict::Unmatched`] sends the URL to automatic grouping
//!
//! Rules are regular expressions searched in the URL path, with `?query`
//! appended when the URL has one.
//!
//! Language is decided independently. A URL whose language differs from the
//! default language never reaches the LLM outputs but stays in the sitemap.

use crate::config::{CurateConfig, RuleConfig};
use crate::normalize::normalize;
use crate::types::{CuratedUrl, NormalizedKey, RawUrlEntry};
use crate::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Exclude patterns applied ahead of configured excludes when
/// `filters.use_default_excludes` is on.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    r"/wp-admin/",
    r"/wp-json/",
    r"/search",
    r"[?&]s=",
    r"[?&]page=\d+",
    r"/page/\d+/?$",
    r"/tag/",
    r"/category/",
    r"/feed/?$",
    r"\.xml$",
    r"\.rss$",
    r"/404",
];

/// ISO 639-1 codes recognised as a locale path segment or subdomain label.
const LANGUAGE_CODES: &[&str] = &[
    "ar", "bg", "bn", "cs", "da", "de", "el", "en", "es", "et", "fa", "fi", "fr", "he", "hi",
    "hr", "hu", "id", "it", "ja", "ko", "lt", "lv", "ms", "nb", "nl", "no", "pl", "pt", "ro",
    "ru", "sk", "sl", "sr", "sv", "th", "tl", "tr", "uk", "ur", "vi", "zh",
];

/// Whether a rule keeps or drops matching URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Assigns group and priority.
    Include,
    /// Removes the URL from LLM curation.
    Exclude,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct FilterRule {
    /// Compiled pattern.
    pub pattern: Regex,
    /// Group assigned by an include rule.
    pub group: Option<String>,
    /// Priority assigned by an include rule.
    pub priority: Option<i32>,
    /// Include or exclude.
    pub kind: RuleKind,
}

impl FilterRule {
    /// Compile a configured rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the pattern is not a valid regex.
    pub fn compile(rule: &RuleConfig, kind: RuleKind) -> Result<Self> {
        let pattern = Regex::new(&rule.pattern)
            .map_err(|e| Error::Config(format!("Invalid rule pattern '{}': {e}", rule.pattern)))?;
        Ok(Self {
            pattern,
            group: rule.group.clone(),
            priority: rule.priority,
            kind,
        })
    }

    /// Whether the rule matches a path-plus-query target.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        self.pattern.is_match(target)
    }
}

/// Outcome of rule evaluation for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An exclude rule matched.
    Excluded,
    /// The first matching include rule.
    Included {
        /// Group from the rule; `None` falls back to automatic grouping.
        group: Option<String>,
        /// Priority from the rule, 0 when unset.
        priority: i32,
    },
    /// No rule matched.
    Unmatched,
}

/// Language markers supplied from outside the URL (e.g. `hreflang`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageHints {
    by_key: HashMap<NormalizedKey, String>,
}

impl LanguageHints {
    /// Empty hint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the language of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedUrl`] when `url` cannot be normalized.
    pub fn insert(&mut self, url: &str, language: &str) -> Result<()> {
        self.by_key.insert(normalize(url)?, normalize_language_tag(language));
        Ok(())
    }

    /// Hint for a normalized key.
    #[must_use]
    pub fn get(&self, key: &NormalizedKey) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    /// Number of hints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether there are no hints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

fn normalize_language_tag(tag: &str) -> String {
    tag.trim().to_ascii_lowercase().replace('_', "-")
}

fn primary_subtag(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

/// Language tag carried by a single path segment or host label.
///
/// Accepts `fr`, `pt-br`, `zh_HK` style values whose primary subtag is a
/// known language code.
#[must_use]
pub fn locale_code(segment: &str) -> Option<String> {
    let tag = normalize_language_tag(segment);
    let mut parts = tag.split('-');
    let primary = parts.next()?;
    let region_ok = match (parts.next(), parts.next()) {
        (None, _) => true,
        (Some(region), None) => (2..=4).contains(&region.len()) && region.chars().all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    };
    (region_ok && LANGUAGE_CODES.contains(&primary)).then_some(tag)
}

/// Infer the language of a URL.
///
/// External hints win, then a leading locale path segment (`/fr/…`), then a
/// locale subdomain (`fr.example.com`).
#[must_use]
pub fn detect_language(url: &Url, key: &NormalizedKey, hints: &LanguageHints) -> Option<String> {
    if let Some(hint) = hints.get(key) {
        return Some(hint.to_string());
    }
    if let Some(first) = url.path_segments().and_then(|mut s| s.next()) {
        if let Some(code) = locale_code(first) {
            return Some(code);
        }
    }
    let host = url.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 3 {
        return locale_code(labels[0]);
    }
    None
}

/// Text the rules are matched against: path, plus `?query` when present.
#[must_use]
pub fn match_target(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{query}", url.path()),
        _ => url.path().to_string(),
    }
}

/// Filter output with per-stage counts.
#[derive(Debug, Clone, Default)]
pub struct FilterOutput {
    /// Partially populated URLs with their verdicts, in input order.
    pub items: Vec<(CuratedUrl, Verdict)>,
    /// URLs matched by an exclude rule.
    pub excluded: usize,
    /// URLs whose language differs from the default.
    pub non_default_language: usize,
    /// Entries whose URL could not be parsed.
    pub malformed: usize,
}

/// Ordered rule list plus language policy.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    rules: Vec<FilterRule>,
    default_language: String,
    sitemap_apply_filters: bool,
}

impl FilterEngine {
    /// Compile the rules of a configuration.
    ///
    /// Default excludes come first, then configured excludes, then includes
    /// in configuration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid rule pattern.
    pub fn from_config(config: &CurateConfig) -> Result<Self> {
        let filters = &config.filters;
        let mut rules = Vec::new();
        if filters.use_default_excludes {
            for pattern in DEFAULT_EXCLUDE_PATTERNS {
                rules.push(FilterRule::compile(&RuleConfig::pattern(*pattern), RuleKind::Exclude)?);
            }
        }
        for rule in &filters.exclude {
            rules.push(FilterRule::compile(rule, RuleKind::Exclude)?);
        }
        for rule in &filters.include {
            rules.push(FilterRule::compile(rule, RuleKind::Include)?);
        }
        Ok(Self {
            rules,
            default_language: normalize_language_tag(&config.site.default_language),
            sitemap_apply_filters: config.output.sitemap_apply_filters,
        })
    }

    /// Compiled rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Evaluate the rules against a match target.
    #[must_use]
    pub fn evaluate(&self, target: &str) -> Verdict {
        if self
            .rules
            .iter()
            .any(|r| r.kind == RuleKind::Exclude && r.matches(target))
        {
            return Verdict::Excluded;
        }
        self.rules
            .iter()
            .find(|r| r.kind == RuleKind::Include && r.matches(target))
            .map_or(Verdict::Unmatched, |rule| Verdict::Included {
                group: rule.group.clone(),
                priority: rule.priority.unwrap_or(0),
            })
    }

    /// Whether `language` is acceptable for LLM outputs.
    #[must_use]
    pub fn is_default_language(&self, language: Option<&str>) -> bool {
        language.is_none_or(|lang| primary_subtag(lang) == primary_subtag(&self.default_language))
    }

    /// Apply rules and language policy to deduplicated entries.
    #[must_use]
    pub fn filter(&self, entries: Vec<(NormalizedKey, RawUrlEntry)>, hints: &LanguageHints) -> FilterOutput {
        let mut output = FilterOutput::default();
        for (key, entry) in entries {
            let Ok(url) = Url::parse(entry.url.trim()) else {
                output.malformed += 1;
                continue;
            };
            let verdict = self.evaluate(&match_target(&url));
            let language = detect_language(&url, &key, hints);
            let default_language = self.is_default_language(language.as_deref());

            let excluded = verdict == Verdict::Excluded;
            if excluded {
                output.excluded += 1;
            }
            if !default_language {
                output.non_default_language += 1;
            }

            let priority = match &verdict {
                Verdict::Included { priority, .. } => *priority,
                Verdict::Excluded | Verdict::Unmatched => 0,
            };
            let curated = CuratedUrl {
                url: entry.url.trim().to_string(),
                normalized_key: key,
                path: url.path().to_string(),
                language,
                group: String::new(),
                priority,
                score: 0,
                title: None,
                summary: None,
                include_in_llms: !excluded && default_language,
                include_in_sitemap: !excluded || !self.sitemap_apply_filters,
                source_kind: entry.source_kind,
                depth: entry.depth,
                lastmod: entry.discovered_lastmod,
            };
            output.items.push((curated, verdict));
        }
        debug!(
            total = output.items.len(),
            excluded = output.excluded,
            non_default_language = output.non_default_language,
            "Applied filter rules"
        );
        output
    }
}
