//! Usage ledger for canonical tags.
//!
//! The ledger is the feedback loop of tagging: every item bumps the count of
//! each slug it resolved to, and the most-used slugs form the known corpus
//! the next canonicalization sees. Only the top `knownTagLimit` entries are
//! visible to matching, so the ranking is part of the contract.

use std::collections::{BTreeMap, HashSet};

use crate::models::TagInfo;
use crate::tagging::normalize;

/// Slug -> usage record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagLedger {
    tags: BTreeMap<String, TagInfo>,
}

impl TagLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, slug: &str) -> Option<&TagInfo> {
        self.tags.get(slug)
    }

    /// All entries in slug order.
    pub fn iter(&self) -> impl Iterator<Item = &TagInfo> {
        self.tags.values()
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, info: TagInfo) {
        self.tags.insert(info.slug().to_string(), info);
    }

    /// The known-tag corpus: slugs by descending count, at most `limit`.
    ///
    /// Equal counts are ordered by slug so the ranking is reproducible.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmark::{TagInfo, TagLedger};
    ///
    /// let ledger: TagLedger = [
    ///     TagInfo::with_count("rust", 5),
    ///     TagInfo::with_count("ai", 9),
    ///     TagInfo::with_count("web", 5),
    /// ]
    /// .into_iter()
    /// .collect();
    ///
    /// assert_eq!(ledger.ranked(2), vec!["ai", "rust"]);
    /// ```
    pub fn ranked(&self, limit: usize) -> Vec<String> {
        let mut entries: Vec<&TagInfo> = self.tags.values().collect();
        // stable sort keeps BTreeMap's slug order within equal counts
        entries.sort_by(|a, b| b.count().cmp(&a.count()));
        entries
            .into_iter()
            .take(limit)
            .map(|info| info.slug().to_string())
            .collect()
    }

    /// Records one tagged item.
    ///
    /// Each distinct non-empty slug gains exactly one use, however many
    /// times it appears in `slugs`. Unknown slugs are created. Returns the
    /// distinct slugs touched, in first-seen order.
    pub fn record<S: AsRef<str>>(&mut self, slugs: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut touched = Vec::new();

        for slug in slugs {
            let slug = slug.as_ref();
            if slug.is_empty() || !seen.insert(slug) {
                continue;
            }
            self.tags
                .entry(slug.to_string())
                .or_insert_with(|| TagInfo::new(slug))
                .add_uses(1);
            touched.push(slug.to_string());
        }

        touched
    }

    /// Merges external usage counts (e.g. from a bookmarking service).
    ///
    /// Names are normalized to slugs; names with no slug are skipped. Counts
    /// add onto existing entries. Returns how many names were merged.
    pub fn import_counts<I, S>(&mut self, counts: I) -> usize
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut imported = 0;
        for (name, count) in counts {
            let slug = normalize(name.as_ref());
            if slug.is_empty() {
                continue;
            }
            self.tags
                .entry(slug.clone())
                .or_insert_with(|| TagInfo::new(slug))
                .add_uses(count);
            imported += 1;
        }
        imported
    }
}

impl FromIterator<TagInfo> for TagLedger {
    fn from_iter<T: IntoIterator<Item = TagInfo>>(iter: T) -> Self {
        let mut ledger = Self::new();
        for info in iter {
            ledger.insert(info);
        }
        ledger
    }
}
