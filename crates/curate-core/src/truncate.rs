//! Profile resolution, per-group and global truncation, output ordering.
//!
//! Truncation only ever clears `include_in_llms`; the sitemap flag is left
//! alone so a truncated URL still reaches `sitemap.xml`.
//!
//! Every sort here ends on `(path, normalized_key)`, which makes the result a
//! pure function of the scored input: running it twice yields the same
//! membership and order.

use crate::config::{FiltersConfig, ProfileConfig};
use crate::grouper::GroupScorer;
use crate::types::CuratedUrl;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Name that selects every group in `include_groups`.
pub const ALL_GROUPS: &str = "*";

/// Effective limits for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationPlan {
    /// Profile name this plan came from, `None` for the base settings.
    pub profile: Option<String>,
    /// Groups allowed in LLM outputs; `None` allows every group.
    pub include_groups: Option<BTreeSet<String>>,
    /// Global ceiling on LLM URLs; 0 disables the ceiling.
    pub max_urls: usize,
    /// Per-group ceilings.
    pub group_limits: BTreeMap<String, usize>,
    /// Ceiling for groups without an entry in `group_limits`.
    pub default_group_limit: Option<usize>,
}

impl TruncationPlan {
    /// Plan from the base filter settings.
    #[must_use]
    pub fn from_filters(filters: &FiltersConfig) -> Self {
        Self {
            profile: None,
            include_groups: None,
            max_urls: filters.max_urls,
            group_limits: filters.group_limits.clone(),
            default_group_limit: filters.default_group_limit,
        }
    }

    /// Limit for a group, if any.
    #[must_use]
    pub fn limit_for(&self, group: &str) -> Option<usize> {
        self.group_limits
            .get(group)
            .copied()
            .or(self.default_group_limit)
    }

    /// Restrict LLM output to exactly `groups`.
    ///
    /// Replaces whatever group set the profile chose. Group limits and the
    /// global ceiling still apply to the selection.
    #[must_use]
    pub fn with_only_groups(mut self, groups: &[String]) -> Self {
        let selected: BTreeSet<String> = groups
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        if !selected.is_empty() {
            debug!(groups = ?selected, "Group selection overrides profile groups");
            self.include_groups = Some(selected);
        }
        self
    }

    fn apply_profile(&mut self, profile: &ProfileConfig) {
        let explicit: BTreeSet<String> = profile
            .include_groups
            .iter()
            .filter(|g| g.as_str() != ALL_GROUPS)
            .cloned()
            .collect();
        if !explicit.is_empty() && !profile.include_groups.iter().any(|g| g == ALL_GROUPS) {
            self.include_groups = Some(explicit);
        }
        if let Some(max) = profile.max_urls {
            self.max_urls = cap(self.max_urls, max);
        }
        self.group_limits.extend(profile.group_limits.clone());
        if profile.default_group_limit.is_some() {
            self.default_group_limit = profile.default_group_limit;
        }
    }
}

/// Smaller of two ceilings where 0 means "no ceiling".
const fn cap(current: usize, limit: usize) -> usize {
    if current == 0 {
        limit
    } else if limit == 0 || current < limit {
        current
    } else {
        limit
    }
}

/// Built-in presets: (name, default group limit, global max).
const PRESETS: &[(&str, Option<usize>, usize)] = &[
    ("minimal", Some(5), 50),
    ("recommended", Some(25), 500),
    ("full", None, 0),
];

/// Resolve a profile name into a plan.
///
/// Built-in presets are applied first, then a configured profile of the same
/// name. The global ceiling never exceeds `filters.max_urls`. An unknown
/// name pushes a warning and yields the base settings.
#[must_use]
pub fn resolve_profile(filters: &FiltersConfig, name: Option<&str>, warnings: &mut Vec<String>) -> TruncationPlan {
    let mut plan = TruncationPlan::from_filters(filters);
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return plan;
    };

    let preset = PRESETS.iter().find(|(preset, _, _)| *preset == name);
    let configured = filters.profiles.get(name);
    if preset.is_none() && configured.is_none() {
        let message = format!("unknown profile '{name}', using base filter settings");
        warn!(profile = %name, "Unknown profile");
        warnings.push(message);
        return plan;
    }

    if let Some((_, default_limit, max_urls)) = preset {
        plan.default_group_limit = *default_limit;
        plan.max_urls = cap(plan.max_urls, *max_urls);
    }
    if let Some(profile) = configured {
        plan.apply_profile(profile);
    }
    plan.profile = Some(name.to_string());
    debug!(profile = %name, max_urls = plan.max_urls, "Resolved profile");
    plan
}

/// Highest score first, then path, then key.
fn by_rank(a: &CuratedUrl, b: &CuratedUrl) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.normalized_key.cmp(&b.normalized_key))
}

/// Apply a plan to scored URLs.
///
/// Steps, each only clearing `include_in_llms`:
///
/// 1. groups outside `include_groups` drop out
/// 2. each group keeps its best `limit_for(group)` URLs
/// 3. the survivors are cut to `max_urls` across groups
///
/// Returns how many URLs lost LLM eligibility.
pub fn truncate(urls: &mut [CuratedUrl], plan: &TruncationPlan) -> usize {
    let mut dropped = 0;
    let mut exclude = |url: &mut CuratedUrl| {
        url.include_in_llms = false;
        dropped += 1;
    };

    if let Some(include) = &plan.include_groups {
        for url in urls.iter_mut().filter(|u| u.include_in_llms) {
            if !include.contains(&url.group) {
                exclude(url);
            }
        }
    }

    let mut by_group: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, url) in urls.iter().enumerate().filter(|(_, u)| u.include_in_llms) {
        by_group.entry(url.group.clone()).or_default().push(idx);
    }
    for (group, mut members) in by_group {
        let Some(limit) = plan.limit_for(&group) else {
            continue;
        };
        if members.len() <= limit {
            continue;
        }
        members.sort_by(|&a, &b| by_rank(&urls[a], &urls[b]));
        debug!(group = %group, limit, candidates = members.len(), "Group limit applied");
        for &idx in &members[limit..] {
            exclude(&mut urls[idx]);
        }
    }

    if plan.max_urls > 0 {
        let mut survivors: Vec<usize> = (0..urls.len()).filter(|&i| urls[i].include_in_llms).collect();
        if survivors.len() > plan.max_urls {
            survivors.sort_by(|&a, &b| by_rank(&urls[a], &urls[b]));
            debug!(max_urls = plan.max_urls, candidates = survivors.len(), "Global limit applied");
            for &idx in &survivors[plan.max_urls..] {
                exclude(&mut urls[idx]);
            }
        }
    }

    dropped
}

/// Sort into output order: group weight, group name, then rank.
pub fn order_for_output(urls: &mut [CuratedUrl], scorer: &GroupScorer) {
    urls.sort_by(|a, b| {
        scorer
            .group_weight(&b.group)
            .cmp(&scorer.group_weight(&a.group))
            .then_with(|| a.group.cmp(&b.group))
            .then_with(|| by_rank(a, b))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::SourceKind;
    use proptest::prelude::*;

    fn url(path: &str, group: &str, score: i64) -> CuratedUrl {
        let full = format!("https://ex.com{path}");
        CuratedUrl {
            normalized_key: normalize(&full).unwrap(),
            url: full,
            path: path.to_string(),
            language: None,
            group: group.to_string(),
            priority: 0,
            score,
            title: None,
            summary: None,
            include_in_llms: true,
            include_in_sitemap: true,
            source_kind: SourceKind::Sitemap,
            depth: 0,
            lastmod: None,
        }
    }

    fn kept(urls: &[CuratedUrl]) -> Vec<&str> {
        urls.iter()
            .filter(|u| u.include_in_llms)
            .map(|u| u.path.as_str())
            .collect()
    }

    fn plan(max_urls: usize) -> TruncationPlan {
        TruncationPlan {
            max_urls,
            ..TruncationPlan::from_filters(&FiltersConfig::default())
        }
    }

    #[test]
    fn test_equal_scores_break_ties_by_path() {
        let mut urls = vec![url("/b", "Other", 10), url("/a", "Other", 10)];
        let dropped = truncate(&mut urls, &plan(1));
        assert_eq!(kept(&urls), vec!["/a"]);
        assert_eq!(dropped, 1);
        assert!(urls.iter().all(|u| u.include_in_sitemap));
    }

    #[test]
    fn test_group_limit_then_global_cut() {
        // Given: Docs has three URLs and a limit of two
        let mut urls = vec![
            url("/docs/a", "Docs", 30),
            url("/docs/b", "Docs", 20),
            url("/docs/c", "Docs", 40),
            url("/pricing", "Pricing", 35),
            url("/about", "About", 5),
        ];
        let mut p = plan(3);
        p.group_limits.insert("Docs".to_string(), 2);

        // When
        truncate(&mut urls, &p);

        // Then: Docs keeps its top two and the global cut removes the weakest
        assert_eq!(kept(&urls), vec!["/docs/a", "/docs/c", "/pricing"]);
    }

    #[test]
    fn test_profiles() {
        let mut warnings = Vec::new();
        let mut filters = FiltersConfig {
            max_urls: 30,
            ..FiltersConfig::default()
        };
        filters.profiles.insert(
            "marketing".to_string(),
            ProfileConfig {
                include_groups: vec!["Products".to_string(), "Pricing".to_string()],
                max_urls: Some(10),
                group_limits: BTreeMap::from([("Products".to_string(), 3)]),
                default_group_limit: None,
            },
        );

        let minimal = resolve_profile(&filters, Some("minimal"), &mut warnings);
        assert_eq!(minimal.default_group_limit, Some(5));
        assert_eq!(minimal.max_urls, 30);

        let full = resolve_profile(&filters, Some("full"), &mut warnings);
        assert_eq!(full.default_group_limit, None);
        assert_eq!(full.max_urls, 30);

        let marketing = resolve_profile(&filters, Some("marketing"), &mut warnings);
        assert_eq!(marketing.max_urls, 10);
        assert_eq!(marketing.limit_for("Products"), Some(3));
        assert!(marketing.include_groups.as_ref().unwrap().contains("Pricing"));
        assert!(warnings.is_empty());

        let unknown = resolve_profile(&filters, Some("nope"), &mut warnings);
        assert_eq!(unknown, TruncationPlan::from_filters(&filters));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_wildcard_profile_keeps_all_groups() {
        let mut filters = FiltersConfig::default();
        filters.profiles.insert(
            "all".to_string(),
            ProfileConfig {
                include_groups: vec![ALL_GROUPS.to_string()],
                ..ProfileConfig::default()
            },
        );
        let plan = resolve_profile(&filters, Some("all"), &mut Vec::new());
        assert!(plan.include_groups.is_none());
    }

    #[test]
    fn test_only_groups_are_selected_before_limits() {
        // Given: Higher-scoring Blog pages that would win the global cut
        let mut urls = vec![
            url("/docs/a", "Docs", 30),
            url("/docs/b", "Docs", 20),
            url("/blog/a", "Blog", 90),
            url("/blog/b", "Blog", 80),
        ];

        // When: Only Docs is requested with room for two URLs
        truncate(&mut urls, &plan(2).with_only_groups(&["Docs".to_string()]));

        // Then: The cap is spent on Docs alone
        assert_eq!(kept(&urls), vec!["/docs/a", "/docs/b"]);
    }

    #[test]
    fn test_only_groups_replace_profile_groups() {
        let mut filters = FiltersConfig::default();
        filters.profiles.insert(
            "sales".to_string(),
            ProfileConfig {
                include_groups: vec!["Products".to_string()],
                ..ProfileConfig::default()
            },
        );
        let plan = resolve_profile(&filters, Some("sales"), &mut Vec::new())
            .with_only_groups(&["Docs".to_string()]);

        let mut urls = vec![url("/products/a", "Products", 40), url("/docs/c", "Docs", 30)];
        truncate(&mut urls, &plan);
        assert_eq!(kept(&urls), vec!["/docs/c"]);

        let unchanged = TruncationPlan::from_filters(&filters).with_only_groups(&[]);
        assert!(unchanged.include_groups.is_none());
    }

    #[test]
    fn test_output_order() {
        let scorer = GroupScorer::default();
        let mut urls = vec![
            url("/blog/x", "Blog", 10),
            url("/pricing", "Pricing", 38),
            url("/products/b", "Products", 41),
            url("/products/a", "Products", 41),
        ];
        order_for_output(&mut urls, &scorer);
        let paths: Vec<_> = urls.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["/products/a", "/products/b", "/pricing", "/blog/x"]);
    }

    proptest! {
        #[test]
        fn prop_truncation_is_deterministic_and_bounded(
            entries in prop::collection::vec(("[a-e]{1,3}", 0i64..5, 0usize..3), 0..40),
            max_urls in 0usize..10,
            group_limit in prop::option::of(0usize..4),
        ) {
            let groups = ["Docs", "Blog", "Other"];
            let mut seen = BTreeSet::new();
            let input: Vec<_> = entries
                .iter()
                .filter(|(p, _, _)| seen.insert(p.clone()))
                .map(|(p, score, g)| url(&format!("/{p}"), groups[*g], *score))
                .collect();
            let mut p = plan(max_urls);
            p.default_group_limit = group_limit;

            let mut first = input.clone();
            let mut second = input.clone();
            second.reverse();
            truncate(&mut first, &p);
            truncate(&mut second, &p);

            let scorer = GroupScorer::default();
            order_for_output(&mut first, &scorer);
            order_for_output(&mut second, &scorer);
            prop_assert_eq!(&first, &second);

            let survivors = first.iter().filter(|u| u.include_in_llms).count();
            if max_urls > 0 {
                prop_assert!(survivors <= max_urls);
            }
        }
    }
}
