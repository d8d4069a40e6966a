//! Advisory duplicate detection
//!
//! Compares word sets of descriptions. A hit only means the caller may want to
//! warn the citizen; submission is never blocked.

use std::collections::HashSet;

/// Jaccard similarity at or above which two descriptions count as duplicates.
pub const DUPLICATE_THRESHOLD: f64 = 0.8;

/// Tokens shorter than this carry too little signal ("a", "on", "is").
const MIN_TOKEN_LEN: usize = 3;

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

pub fn similarity(a: &str, b: &str) -> f64 {
    let left = tokens(a);
    let right = tokens(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

pub fn is_duplicate<'a, I>(description: &str, existing: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if tokens(description).is_empty() {
        return false;
    }
    existing
        .into_iter()
        .any(|other| similarity(description, other) >= DUPLICATE_THRESHOLD)
}
