use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

/// Normalizes a raw tag string into a slug.
///
/// # Normalization rules
///
/// - Converts to lowercase
/// - Applies NFKD decomposition so accented letters split into a base letter
///   plus combining marks
/// - Drops every character outside `a-z`, `0-9`, whitespace, `-` and `_`
///   (this is what strips the combining marks)
/// - Collapses runs of whitespace, underscores and hyphens into one hyphen.
///   Whitespace is the ECMAScript `\s` set: U+FEFF counts, U+0085 does not
/// - Trims leading/trailing hyphens
///
/// Input with no retained characters yields an empty string, which callers
/// treat as "no tag".
///
/// # Examples
///
/// ```
/// use tagmark::tagging::normalize;
///
/// assert_eq!(normalize("Deep Learning"), "deep-learning");
/// assert_eq!(normalize("Café  Culture"), "cafe-culture");
/// assert_eq!(normalize("snake_case__tag"), "snake-case-tag");
/// assert_eq!(normalize("A.I."), "ai");
/// assert_eq!(normalize("  --rust--  "), "rust");
/// assert_eq!(normalize("!!!"), "");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());

    for c in raw.to_lowercase().nfkd() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if (is_separator_space(c) || c == '-' || c == '_')
            && !slug.is_empty()
            && !slug.ends_with('-')
        {
            slug.push('-');
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn is_separator_space(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{feff}'
}

/// Normalizes a batch of tags, dropping empty slugs and repeats.
///
/// Order of first occurrence is preserved.
///
/// # Examples
///
/// ```
/// use tagmark::tagging::normalize_all;
///
/// let tags = ["Rust", "rust", "???", "Web Dev"];
/// assert_eq!(normalize_all(tags), vec!["rust", "web-dev"]);
/// ```
#[must_use]
pub fn normalize_all<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| normalize(tag.as_ref()))
        .filter(|slug| !slug.is_empty() && seen.insert(slug.clone()))
        .collect()
}
