use super::normalizer::normalize;

/// Scores how alike two tags are on a 0-100 scale.
///
/// Both inputs are normalized first, then compared with unit-cost
/// Levenshtein distance:
///
/// `round(100 * (1 - distance / max(len(a), len(b), 1)))`
///
/// Two inputs that both normalize to the empty string score 100.
///
/// # Examples
///
/// ```
/// use tagmark::tagging::similarity;
///
/// assert_eq!(similarity("Rust", "rust"), 100);
/// assert_eq!(similarity("machinelearning", "machine-learning"), 94);
/// assert_eq!(similarity("abc", "xyz"), 0);
/// ```
#[must_use]
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);

    // Slugs are ASCII, so byte length equals character count.
    let longest = a.len().max(b.len()).max(1);
    let distance = strsim::levenshtein(&a, &b);

    let score = 100.0 * (1.0 - distance as f64 / longest as f64);
    score.round().clamp(0.0, 100.0) as u8
}
