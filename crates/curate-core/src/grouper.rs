//! Automatic grouping and importance scoring.
//!
//! URLs that no include rule claimed get a group from their first meaningful
//! path segment, looked up in a fixed category table. Every URL then gets a
//! deterministic score:
//!
//! ```text
//! score = rule_priority * 100 + group_weight + max(0, 10 - 2 * path_depth)
//! ```
//!
//! `rule_priority` dominates, the group weight orders business importance
//! (Home > Products > Pricing > Docs > verticals > Blog > the rest) and the
//! path bonus favours shallow pages. `path_depth` counts path segments, so
//! `/` gets the full bonus of 10.

use crate::config::FiltersConfig;
use crate::filter::{Verdict, locale_code};
use crate::types::CuratedUrl;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Group of the site root.
pub const HOME_GROUP: &str = "Home";

/// Group for anything the table does not know.
pub const OTHER_GROUP: &str = "Other";

/// Category table: display name and the path segments that map to it.
///
/// Order matters; the first category listing a segment wins.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    ("Blog", &["blog", "blogs", "article", "articles", "post", "posts"]),
    (
        "Docs",
        &["doc", "docs", "documentation", "help", "guide", "guides", "developers", "developer"],
    ),
    ("Products", &["product", "products", "solution", "solutions"]),
    ("Pricing", &["pricing", "price", "prices", "plan", "plans"]),
    ("About", &["about", "about-us", "company"]),
    ("Support", &["contact", "support"]),
    ("Use Cases", &["case", "cases", "use-case", "use-cases"]),
    ("Integrations", &["integration", "integrations", "resource", "resources"]),
    ("Proxy Locations", &["location", "locations", "proxy-location", "proxy-locations"]),
    ("Legal", &["legal", "privacy", "terms", "policy", "policies"]),
    ("Careers", &["career", "careers", "jobs", "hiring"]),
    ("Press", &["press", "news", "newsroom", "media"]),
    ("Partners", &["affiliate", "affiliates", "partner", "partners"]),
    ("Datasets", &["dataset", "datasets", "data"]),
    ("SERP", &["serp", "search"]),
    ("Scrapers", &["scraper", "scrapers", "scraping"]),
    ("Proxies", &["proxy", "proxies"]),
];

/// Built-in group weights; anything missing weighs [`DEFAULT_GROUP_WEIGHT`].
const GROUP_WEIGHTS: &[(&str, i64)] = &[
    (HOME_GROUP, 40),
    ("Products", 35),
    ("Pricing", 30),
    ("Docs", 28),
    ("Proxies", 27),
    ("Scrapers", 26),
    ("SERP", 24),
    ("Use Cases", 24),
    ("Integrations", 24),
    ("Datasets", 23),
    ("Proxy Locations", 22),
    ("Blog", 21),
    ("About", 20),
    ("Partners", 19),
    ("Legal", 18),
    ("Press", 17),
    ("Careers", 15),
];

/// Weight of groups without a built-in or configured weight.
pub const DEFAULT_GROUP_WEIGHT: i64 = 10;

/// Multiplier that keeps rule priority the dominant score term.
const PRIORITY_FACTOR: i64 = 100;

/// Largest shallow-path bonus.
const PATH_BONUS_MAX: i64 = 10;

/// Category for one path segment, case-insensitively.
#[must_use]
pub fn category_for_segment(segment: &str) -> Option<&'static str> {
    let segment = segment.to_ascii_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, segments)| segments.contains(&segment.as_str()))
        .map(|(name, _)| *name)
}

/// Automatic group for a URL.
///
/// The root path is grouped by the first host label (`blog.*` → Blog,
/// `docs.*` or `developer.*` → Docs, otherwise Home). Elsewhere the first
/// path segment decides, skipping a leading locale segment such as `/fr/`.
///
/// ```rust
/// use curate_core::grouper::auto_group;
/// use url::Url;
///
/// let group = |u: &str| auto_group(&Url::parse(u).unwrap());
/// assert_eq!(group("https://ex.com/"), "Home");
/// assert_eq!(group("https://blog.ex.com/"), "Blog");
/// assert_eq!(group("https://ex.com/zh-hk/pricing/team"), "Pricing");
/// assert_eq!(group("https://ex.com/whatever"), "Other");
/// ```
#[must_use]
pub fn auto_group(url: &Url) -> String {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let Some(first) = segments.first() else {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let group = match host.split('.').next().unwrap_or_default() {
            "blog" | "blogs" => "Blog",
            "doc" | "docs" | "developer" | "developers" => "Docs",
            _ => HOME_GROUP,
        };
        return group.to_string();
    };

    let segment = if segments.len() > 1 && locale_code(first).is_some() {
        segments[1]
    } else {
        *first
    };
    category_for_segment(segment).unwrap_or(OTHER_GROUP).to_string()
}

/// Every group a configuration can produce.
///
/// Include-rule groups and [`OTHER_GROUP`] always; the category table and
/// [`HOME_GROUP`] when automatic grouping is on.
#[must_use]
pub fn producible_groups(filters: &FiltersConfig) -> BTreeSet<String> {
    let mut groups: BTreeSet<String> = filters
        .include
        .iter()
        .filter_map(|rule| rule.group.clone())
        .collect();
    groups.insert(OTHER_GROUP.to_string());
    if filters.auto_group {
        groups.insert(HOME_GROUP.to_string());
        groups.extend(CATEGORIES.iter().map(|(name, _)| (*name).to_string()));
    }
    groups
}

/// Assigns groups and scores.
#[derive(Debug, Clone)]
pub struct GroupScorer {
    auto_group: bool,
    weight_overrides: BTreeMap<String, i64>,
    llms_exclude_groups: BTreeSet<String>,
}

impl Default for GroupScorer {
    fn default() -> Self {
        Self::from_filters(&FiltersConfig::default())
    }
}

impl GroupScorer {
    /// Scorer configured from filter settings.
    #[must_use]
    pub fn from_filters(filters: &FiltersConfig) -> Self {
        Self {
            auto_group: filters.auto_group,
            weight_overrides: filters
                .group_weights
                .iter()
                .map(|(group, weight)| (group.to_ascii_lowercase(), *weight))
                .collect(),
            llms_exclude_groups: filters
                .llms_exclude_groups
                .iter()
                .map(|g| g.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Business weight of a group.
    #[must_use]
    pub fn group_weight(&self, group: &str) -> i64 {
        let key = group.to_ascii_lowercase();
        if let Some(weight) = self.weight_overrides.get(&key) {
            return *weight;
        }
        GROUP_WEIGHTS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(group))
            .map_or(DEFAULT_GROUP_WEIGHT, |(_, weight)| *weight)
    }

    /// Whether a group is kept out of LLM outputs by policy.
    #[must_use]
    pub fn is_llms_excluded(&self, group: &str) -> bool {
        self.llms_exclude_groups.contains(&group.to_ascii_lowercase())
    }

    /// Score from rule priority, group and path.
    #[must_use]
    pub fn score(&self, priority: i32, group: &str, path: &str) -> i64 {
        let depth = i64::try_from(path.split('/').filter(|s| !s.is_empty()).count()).unwrap_or(i64::MAX);
        let path_bonus = PATH_BONUS_MAX.saturating_sub(depth.saturating_mul(2)).max(0);
        i64::from(priority)
            .saturating_mul(PRIORITY_FACTOR)
            .saturating_add(self.group_weight(group))
            .saturating_add(path_bonus)
    }

    /// Finish a filtered URL: set its group and score.
    ///
    /// Returns whether the URL lost LLM eligibility because of its group.
    pub fn score_and_group(&self, url: &mut CuratedUrl, verdict: &Verdict) -> bool {
        let explicit = match verdict {
            Verdict::Included { group: Some(group), .. } => Some(group.clone()),
            _ => None,
        };
        url.group = explicit.unwrap_or_else(|| {
            if self.auto_group {
                Url::parse(&url.url).map_or_else(|_| OTHER_GROUP.to_string(), |u| auto_group(&u))
            } else {
                OTHER_GROUP.to_string()
            }
        });
        url.score = self.score(url.priority, &url.group, &url.path);

        if url.include_in_llms && self.is_llms_excluded(&url.group) {
            url.include_in_llms = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::SourceKind;

    fn curated(url: &str, priority: i32) -> CuratedUrl {
        let parsed = Url::parse(url).unwrap();
        CuratedUrl {
            url: url.to_string(),
            normalized_key: normalize(url).unwrap(),
            path: parsed.path().to_string(),
            language: None,
            group: String::new(),
            priority,
            score: 0,
            title: None,
            summary: None,
            include_in_llms: true,
            include_in_sitemap: true,
            source_kind: SourceKind::Sitemap,
            depth: 0,
            lastmod: None,
        }
    }

    #[test]
    fn test_category_table() {
        let group = |u: &str| auto_group(&Url::parse(u).unwrap());
        assert_eq!(group("https://ex.com/products/a"), "Products");
        assert_eq!(group("https://ex.com/Blog/x"), "Blog");
        assert_eq!(group("https://ex.com/help/faq"), "Docs");
        assert_eq!(group("https://ex.com/careers"), "Careers");
        assert_eq!(group("https://ex.com/legal/terms"), "Legal");
        assert_eq!(group("https://docs.ex.com/"), "Docs");
        assert_eq!(group("https://ex.com/fr"), "Other");
    }

    #[test]
    fn test_root_group_uses_first_host_label() {
        let group = |u: &str| auto_group(&Url::parse(u).unwrap());
        assert_eq!(group("https://developer.ex.com/"), "Docs");
        assert_eq!(group("https://blog.ex.com/"), "Blog");
        assert_eq!(group("https://docker.com/"), HOME_GROUP);
        assert_eq!(group("https://doctorly.io/"), HOME_GROUP);
        assert_eq!(group("https://myblog.ex.com/"), HOME_GROUP);
    }

    #[test]
    fn test_business_order_of_weights() {
        let scorer = GroupScorer::default();
        let order = ["Products", "Pricing", "Docs", "Proxies", "Blog", "Other"];
        for pair in order.windows(2) {
            assert!(scorer.group_weight(pair[0]) > scorer.group_weight(pair[1]), "{pair:?}");
        }
        assert_eq!(scorer.group_weight("Unknown"), DEFAULT_GROUP_WEIGHT);
    }

    #[test]
    fn test_score_terms() {
        let scorer = GroupScorer::default();
        assert_eq!(scorer.score(0, "Home", "/"), 50);
        assert_eq!(scorer.score(0, "Products", "/products/a"), 35 + 6);
        assert_eq!(scorer.score(2, "Other", "/a/b/c/d/e/f"), 200 + 10);
        assert!(scorer.score(1, "Other", "/x/y/z") > scorer.score(0, "Home", "/"));
    }

    #[test]
    fn test_configured_weights_and_llms_exclusion() {
        let filters = FiltersConfig {
            group_weights: BTreeMap::from([("blog".to_string(), 99)]),
            llms_exclude_groups: vec!["Careers".to_string()],
            ..FiltersConfig::default()
        };
        let scorer = GroupScorer::from_filters(&filters);
        assert_eq!(scorer.group_weight("Blog"), 99);

        let mut url = curated("https://ex.com/careers/engineer", 0);
        assert!(scorer.score_and_group(&mut url, &Verdict::Unmatched));
        assert_eq!(url.group, "Careers");
        assert!(!url.include_in_llms);
        assert!(url.include_in_sitemap);
    }

    #[test]
    fn test_rule_group_and_fallbacks() {
        let scorer = GroupScorer::default();
        let mut ruled = curated("https://ex.com/x", 5);
        scorer.score_and_group(
            &mut ruled,
            &Verdict::Included {
                group: Some("Featured".to_string()),
                priority: 5,
            },
        );
        assert_eq!(ruled.group, "Featured");
        assert_eq!(ruled.score, 500 + DEFAULT_GROUP_WEIGHT + 8);

        let manual = GroupScorer::from_filters(&FiltersConfig {
            auto_group: false,
            ..FiltersConfig::default()
        });
        let mut plain = curated("https://ex.com/pricing", 0);
        manual.score_and_group(&mut plain, &Verdict::Unmatched);
        assert_eq!(plain.group, OTHER_GROUP);
    }

    #[test]
    fn test_producible_groups() {
        let mut filters = FiltersConfig::default();
        assert!(producible_groups(&filters).contains("Pricing"));
        filters.auto_group = false;
        assert_eq!(producible_groups(&filters), BTreeSet::from([OTHER_GROUP.to_string()]));
    }
}
