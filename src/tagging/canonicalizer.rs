//! Reconciles candidate tags against aliases and the known-tag corpus.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::normalizer::normalize;
use super::similarity::similarity;

/// User-curated overrides: normalized candidate slug -> canonical slug.
pub type AliasTable = BTreeMap<String, String>;

/// How a single candidate was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The alias table mapped the candidate to `target`.
    Alias { target: String },
    /// The candidate was already a known tag.
    Exact { slug: String },
    /// The candidate merged into a known tag scoring at or above the threshold.
    Fuzzy { slug: String, score: u8 },
    /// Nothing matched closely enough; the candidate becomes a new tag.
    New { slug: String },
}

impl Resolution {
    /// The slug this resolution produces.
    pub fn slug(&self) -> &str {
        match self {
            Self::Alias { target } => target,
            Self::Exact { slug } | Self::Fuzzy { slug, .. } | Self::New { slug } => slug,
        }
    }
}

/// Maps raw candidate tags onto a stable vocabulary.
///
/// `known` must be ordered by descending usage: when several known tags tie
/// for the best fuzzy score, the earliest one in `known` wins.
///
/// # Examples
///
/// ```
/// use tagmark::tagging::{AliasTable, Canonicalizer};
///
/// let known = vec!["machine-learning".to_string()];
/// let mut aliases = AliasTable::new();
/// aliases.insert("ml".to_string(), "machine-learning".to_string());
///
/// let canonicalizer = Canonicalizer::new(&known, &aliases, 90);
/// let tags = canonicalizer.canonicalize(["ML", "MachineLearning", "Rust"]);
/// assert_eq!(tags, vec!["machine-learning", "rust"]);
/// ```
pub struct Canonicalizer<'a> {
    known: &'a [String],
    known_set: HashSet<&'a str>,
    aliases: &'a AliasTable,
    threshold: u8,
}

impl<'a> Canonicalizer<'a> {
    /// Creates a canonicalizer over a ranked known-tag corpus.
    pub fn new(known: &'a [String], aliases: &'a AliasTable, threshold: u8) -> Self {
        Self {
            known,
            known_set: known.iter().map(String::as_str).collect(),
            aliases,
            threshold,
        }
    }

    /// Resolves one candidate, or `None` if it normalizes to nothing.
    pub fn resolve(&self, candidate: &str) -> Option<Resolution> {
        let slug = normalize(candidate);
        if slug.is_empty() {
            return None;
        }

        if let Some(target) = self.aliases.get(&slug).filter(|t| !t.is_empty()) {
            return Some(Resolution::Alias {
                target: target.clone(),
            });
        }

        if self.known_set.contains(slug.as_str()) {
            return Some(Resolution::Exact { slug });
        }

        match self.closest_known(&slug) {
            Some((known, score)) if score >= self.threshold => Some(Resolution::Fuzzy {
                slug: known.to_string(),
                score,
            }),
            _ => Some(Resolution::New { slug }),
        }
    }

    /// Canonicalizes a batch of candidates.
    ///
    /// The result is de-duplicated and ordered by first resolution.
    pub fn canonicalize<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for candidate in candidates {
            let candidate = candidate.as_ref();
            let Some(resolution) = self.resolve(candidate) else {
                debug!(candidate, "dropping candidate with empty slug");
                continue;
            };
            debug!(candidate, ?resolution, "resolved tag candidate");

            let slug = resolution.slug();
            if seen.insert(slug.to_string()) {
                out.push(slug.to_string());
            }
        }

        out
    }

    /// Best-scoring known tag. Ties keep the earlier entry; a score of zero
    /// never counts as a match.
    fn closest_known(&self, slug: &str) -> Option<(&'a str, u8)> {
        let mut best: Option<(&'a str, u8)> = None;
        for known in self.known {
            let score = similarity(slug, known);
            let best_score = best.map_or(0, |(_, s)| s);
            if score > best_score {
                best = Some((known.as_str(), score));
            }
        }
        best
    }
}

/// Canonicalizes `candidates` against a ranked corpus, aliases and a
/// dedupe threshold (0-100).
///
/// # Examples
///
/// ```
/// use tagmark::tagging::{canonicalize, AliasTable};
///
/// let tags = canonicalize(&["AI", "ai", "A.I."], &[], &AliasTable::new(), 82);
/// assert_eq!(tags, vec!["ai"]);
/// ```
pub fn canonicalize<S: AsRef<str>>(
    candidates: &[S],
    known: &[String],
    aliases: &AliasTable,
    threshold: u8,
) -> Vec<String> {
    Canonicalizer::new(known, aliases, threshold).canonicalize(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn aliases(pairs: &[(&str, &str)]) -> AliasTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn new_tag_with_empty_corpus() {
        let result = canonicalize(&["Deep Learning"], &[], &AliasTable::new(), 82);
        assert_eq!(result, vec!["deep-learning"]);
    }

    #[test]
    fn empty_candidate_list_yields_empty_result() {
        let known = strings(&["rust"]);
        let result = canonicalize::<&str>(&[], &known, &AliasTable::new(), 82);
        assert!(result.is_empty());
    }

    #[test]
    fn empty_corpus_keeps_every_candidate_as_new() {
        let result = canonicalize(&["Rust", "Tokio", "Async IO"], &[], &AliasTable::new(), 0);
        assert_eq!(result, vec!["rust", "tokio", "async-io"]);
    }

    #[test]
    fn duplicate_candidates_collapse() {
        let result = canonicalize(&["AI", "ai", "A.I."], &[], &AliasTable::new(), 82);
        assert_eq!(result, vec!["ai"]);
    }

    #[test]
    fn exact_match_wins_over_decoys() {
        let known = strings(&["deep-learning", "ml"]);
        let aliases = AliasTable::new();
        let canonicalizer = Canonicalizer::new(&known, &aliases, 82);

        assert_eq!(
            canonicalizer.resolve("deep-learning"),
            Some(Resolution::Exact {
                slug: "deep-learning".to_string()
            })
        );
        assert_eq!(canonicalizer.canonicalize(["deep-learning"]), vec!["deep-learning"]);
    }

    #[test]
    fn exact_match_is_found_even_when_ranked_last() {
        // "rusty" would score 80 against "rust" first, but exact match short-circuits
        let known = strings(&["rust", "rusty"]);
        let result = canonicalize(&["Rusty"], &known, &AliasTable::new(), 50);
        assert_eq!(result, vec!["rusty"]);
    }

    #[test]
    fn alias_takes_precedence_regardless_of_threshold() {
        let table = aliases(&[("foo", "bar")]);
        for threshold in [0, 50, 100] {
            let result = canonicalize(&["Foo"], &[], &table, threshold);
            assert_eq!(result, vec!["bar"]);
        }
    }

    #[test]
    fn alias_bypasses_exact_and_fuzzy_matching() {
        let known = strings(&["js", "javascript"]);
        let table = aliases(&[("js", "javascript")]);
        let result = canonicalize(&["JS"], &known, &table, 82);
        assert_eq!(result, vec!["javascript"]);
    }

    #[test]
    fn alias_targets_are_accepted_as_given() {
        let table = aliases(&[("k8s", "Kubernetes Platform")]);
        let result = canonicalize(&["k8s"], &[], &table, 82);
        assert_eq!(result, vec!["Kubernetes Platform"]);
    }

    #[test]
    fn alias_keys_match_normalized_candidates() {
        let table = aliases(&[("machine-learning", "ml")]);
        let result = canonicalize(&["Machine  Learning"], &[], &table, 82);
        assert_eq!(result, vec!["ml"]);
    }

    #[test]
    fn empty_alias_target_falls_through_to_exact() {
        let known = strings(&["rust"]);
        let table = aliases(&[("rust", "")]);
        let canonicalizer = Canonicalizer::new(&known, &table, 82);

        assert_eq!(
            canonicalizer.resolve("Rust"),
            Some(Resolution::Exact {
                slug: "rust".to_string()
            })
        );
        assert_eq!(canonicalize(&["Rust"], &known, &table, 82), vec!["rust"]);
    }

    #[test]
    fn fuzzy_merge_at_threshold_boundary() {
        let known = strings(&["machine-learning"]);

        let merged = canonicalize(&["machinelearning"], &known, &AliasTable::new(), 90);
        assert_eq!(merged, vec!["machine-learning"]);

        let at_score = canonicalize(&["machinelearning"], &known, &AliasTable::new(), 94);
        assert_eq!(at_score, vec!["machine-learning"]);

        let kept = canonicalize(&["machinelearning"], &known, &AliasTable::new(), 96);
        assert_eq!(kept, vec!["machinelearning"]);
    }

    #[test]
    fn fuzzy_resolution_reports_score() {
        let known = strings(&["machine-learning"]);
        let aliases = AliasTable::new();
        let canonicalizer = Canonicalizer::new(&known, &aliases, 90);
        assert_eq!(
            canonicalizer.resolve("machinelearning"),
            Some(Resolution::Fuzzy {
                slug: "machine-learning".to_string(),
                score: 94
            })
        );
    }

    #[test]
    fn fuzzy_ties_keep_first_known_tag() {
        // "cat" is one substitution away from both; earlier rank wins
        let known = strings(&["bat", "hat"]);
        let result = canonicalize(&["cat"], &known, &AliasTable::new(), 60);
        assert_eq!(result, vec!["bat"]);

        let reversed = strings(&["hat", "bat"]);
        let result = canonicalize(&["cat"], &reversed, &AliasTable::new(), 60);
        assert_eq!(result, vec!["hat"]);
    }

    #[test]
    fn fuzzy_picks_strictly_highest_score() {
        let known = strings(&["javascript", "typescripts", "typescript-lang"]);
        // "typescript" vs "typescripts" = 91, vs "typescript-lang" = 67
        let result = canonicalize(&["TypeScript"], &known, &AliasTable::new(), 82);
        assert_eq!(result, vec!["typescripts"]);
    }

    #[test]
    fn zero_threshold_with_no_overlap_keeps_candidate() {
        let known = strings(&["xyz"]);
        let result = canonicalize(&["abc"], &known, &AliasTable::new(), 0);
        assert_eq!(result, vec!["abc"]);
    }

    #[test]
    fn semantic_synonyms_are_not_merged() {
        let known = strings(&["machine-learning"]);
        let result = canonicalize(&["ML"], &known, &AliasTable::new(), 82);
        assert_eq!(result, vec!["ml"]);
    }

    #[test]
    fn empty_slugs_are_dropped() {
        let known = strings(&["rust"]);
        let result = canonicalize(&["!!!", "  ", "Rust"], &known, &AliasTable::new(), 0);
        assert_eq!(result, vec!["rust"]);
    }

    #[test]
    fn merged_and_exact_candidates_dedupe_together() {
        let known = strings(&["machine-learning"]);
        let result = canonicalize(
            &["machine-learning", "machinelearning", "Machine Learning"],
            &known,
            &AliasTable::new(),
            90,
        );
        assert_eq!(result, vec!["machine-learning"]);
    }

    #[test]
    fn output_follows_first_resolution_order() {
        let known = strings(&["rust", "web-development"]);
        let table = aliases(&[("webdev", "web-development")]);
        let result = canonicalize(
            &["Tokio", "webdev", "rust", "Web Development", "tokio"],
            &known,
            &table,
            82,
        );
        assert_eq!(result, vec!["tokio", "web-development", "rust"]);
    }

    #[test]
    fn output_never_contains_duplicates() {
        let known = strings(&["rust", "rust-lang", "async"]);
        let table = aliases(&[("rustlang", "rust")]);
        let candidates = [
            "Rust", "rust", "RustLang", "rust-lang", "rust lang", "Async", "asyncs", "async",
        ];
        let result = canonicalize(&candidates, &known, &table, 80);

        let unique: HashSet<&String> = result.iter().collect();
        assert_eq!(unique.len(), result.len());
    }
}
