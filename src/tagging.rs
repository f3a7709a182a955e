//! Tag canonicalization and suggestion.
//!
//! Candidate tags arrive noisy: mixed case, punctuation, accents, and
//! near-duplicates of tags the user already has. This module turns them
//! into a stable set of slugs.
//!
//! - [`normalize`] maps any string to a slug (`[a-z0-9-]`, no edge or
//!   doubled hyphens).
//! - [`similarity`] scores two tags 0-100 by edit distance on their slugs.
//! - [`Canonicalizer`] resolves each candidate by alias, then exact match
//!   against the known corpus, then fuzzy merge above a threshold, and
//!   otherwise keeps it as a new tag.
//! - [`TagSuggester`] asks an LLM for the raw candidates.
//!
//! # Examples
//!
//! ```
//! use tagmark::tagging::{canonicalize, AliasTable};
//!
//! let known = vec!["machine-learning".to_string(), "rust".to_string()];
//! let mut aliases = AliasTable::new();
//! aliases.insert("rustlang".to_string(), "rust".to_string());
//!
//! let tags = canonicalize(
//!     &["Machine Learning", "RustLang", "Tokio"],
//!     &known,
//!     &aliases,
//!     82,
//! );
//! assert_eq!(tags, vec!["machine-learning", "rust", "tokio"]);
//! ```
//!
//! Matching is purely lexical: "ml" and "machine-learning" never merge on
//! their own. Use an alias for that.

mod canonicalizer;
mod normalizer;
mod similarity;
mod suggester;

pub use canonicalizer::{AliasTable, Canonicalizer, Resolution, canonicalize};
pub use normalizer::{normalize, normalize_all};
pub use similarity::similarity;
pub use suggester::{SuggestionContext, TagSuggester, TagSuggesterBuilder};
