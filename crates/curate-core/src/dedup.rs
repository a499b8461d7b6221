//! Collapse raw entries into one entry per normalized URL.

use crate::normalize::normalize;
use crate::types::{NormalizedKey, RawUrlEntry};
use std::collections::HashMap;
use tracing::debug;

/// Result of deduplication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deduplicated {
    /// Winning entries in first-seen order of their key.
    pub entries: Vec<(NormalizedKey, RawUrlEntry)>,
    /// Entries merged into an already-seen key.
    pub duplicates_removed: usize,
    /// Entries dropped because they could not be normalized.
    pub malformed: usize,
}

/// Whether `candidate` should replace `current` for the same key.
///
/// Higher source priority wins, then lower depth. On a full tie the entry
/// seen first stays.
const fn outranks(candidate: &RawUrlEntry, current: &RawUrlEntry) -> bool {
    if candidate.source_priority != current.source_priority {
        return candidate.source_priority > current.source_priority;
    }
    candidate.depth < current.depth
}

/// Deduplicate by normalized key.
///
/// Output order follows the first appearance of each key, so the result is
/// stable for a given input order.
///
/// ```rust
/// use curate_core::dedup::dedupe;
/// use curate_core::{RawUrlEntry, SourceKind};
///
/// let result = dedupe(vec![
///     RawUrlEntry::new("https://ex.com/page", SourceKind::Sitemap).with_priority(1),
///     RawUrlEntry::new("https://ex.com/page/", SourceKind::Static).with_priority(5),
/// ]);
/// assert_eq!(result.entries.len(), 1);
/// assert_eq!(result.duplicates_removed, 1);
/// assert_eq!(result.entries[0].1.source_priority, 5);
/// ```
#[must_use]
pub fn dedupe<I>(raw_entries: I) -> Deduplicated
where
    I: IntoIterator<Item = RawUrlEntry>,
{
    let mut result = Deduplicated::default();
    let mut index: HashMap<NormalizedKey, usize> = HashMap::new();

    for entry in raw_entries {
        let key = match normalize(&entry.url) {
            Ok(key) => key,
            Err(e) => {
                debug!(url = %entry.url, error = %e, "Dropping malformed URL");
                result.malformed += 1;
                continue;
            },
        };

        match index.get(&key) {
            Some(&slot) => {
                result.duplicates_removed += 1;
                if outranks(&entry, &result.entries[slot].1) {
                    result.entries[slot].1 = entry;
                }
            },
            None => {
                index.insert(key.clone(), result.entries.len());
                result.entries.push((key, entry));
            },
        }
    }

    debug!(
        unique = result.entries.len(),
        duplicates = result.duplicates_removed,
        malformed = result.malformed,
        "Deduplicated raw entries"
    );
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn entry(url: &str, priority: i32, depth: u32) -> RawUrlEntry {
        RawUrlEntry::new(url, SourceKind::Crawl)
            .with_priority(priority)
            .with_depth(depth)
    }

    #[test]
    fn test_trailing_slash_duplicates_collapse() {
        let result = dedupe(vec![
            entry("https://ex.com/page", 0, 0),
            entry("https://ex.com/page/", 0, 0),
        ]);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.entries[0].1.url, "https://ex.com/page");
    }

    #[test]
    fn test_tie_breaks_depth_then_first_seen() {
        let result = dedupe(vec![
            entry("https://ex.com/a", 3, 2).with_lastmod(None),
            entry("https://EX.com/a", 3, 1),
            entry("https://ex.com/a#top", 3, 1),
        ]);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].1.url, "https://EX.com/a");
        assert_eq!(result.duplicates_removed, 2);
    }

    #[test]
    fn test_lower_priority_never_replaces() {
        let result = dedupe(vec![entry("https://ex.com/a", 5, 3), entry("https://ex.com/a/", 1, 0)]);
        assert_eq!(result.entries[0].1.source_priority, 5);
    }

    #[test]
    fn test_malformed_entries_are_counted() {
        let result = dedupe(vec![
            entry("not a url", 0, 0),
            entry("mailto:someone@ex.com", 0, 0),
            entry("https://ex.com/ok", 0, 0),
        ]);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.malformed, 2);
    }

    proptest! {
        #[test]
        fn prop_keys_are_unique(
            paths in prop::collection::vec("[a-c]{0,2}/?", 0..30),
            priorities in prop::collection::vec(0i32..4, 30),
        ) {
            let raw: Vec<_> = paths
                .iter()
                .zip(&priorities)
                .map(|(p, prio)| entry(&format!("https://ex.com/{p}"), *prio, 0))
                .collect();
            let total = raw.len();
            let result = dedupe(raw);

            let keys: HashSet<_> = result.entries.iter().map(|(k, _)| k.clone()).collect();
            prop_assert_eq!(keys.len(), result.entries.len());
            prop_assert_eq!(result.entries.len() + result.duplicates_removed, total);
        }
    }
}
