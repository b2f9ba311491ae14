// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Market tag normalization
//!
//! Raw market names never reach the relay: every read and write goes
//! through [`market_tag`].

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static NORMALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^market_[a-z0-9]+(_[a-z0-9]+)*$").expect("Invalid regex"));

/// Normalize a market name into a relay tag.
///
/// NFKD-decompose, strip diacritics, lowercase, map every other
/// non-alphanumeric to `_`, collapse runs, trim, prefix with `market_`.
/// Idempotent: a tag that is already in normalized form passes through
/// unchanged, so layers can safely hand each other normalized tags.
///
/// `"Marché de Paris"` -> `"market_marche_de_paris"`
pub fn market_tag(market: &str) -> String {
    if NORMALIZED.is_match(market) {
        return market.to_string();
    }

    let folded: String = market
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut cleaned = String::with_capacity(folded.len());
    let mut last_was_underscore = true; // trims leading separators

    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            cleaned.push('_');
            last_was_underscore = true;
        }
    }

    let cleaned = cleaned.trim_end_matches('_');

    format!("market_{cleaned}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diacritics_and_case() {
        assert_eq!(market_tag("Marché de Paris"), "market_marche_de_paris");
        assert_eq!(market_tag("TOULOUSE"), "market_toulouse");
    }

    #[test]
    fn test_separator_collapsing() {
        assert_eq!(market_tag("  foo -- bar  "), "market_foo_bar");
        assert_eq!(market_tag("a///b"), "market_a_b");
    }

    #[test]
    fn test_idempotent() {
        let tag = market_tag("Marché de Paris");
        assert_eq!(market_tag(&tag), tag);
        assert_eq!(market_tag("market_hackathon"), "market_hackathon");
    }

    #[test]
    fn test_non_normalized_market_prefix_is_still_folded() {
        // looks prefixed but carries uppercase: goes through the full fold
        assert_eq!(market_tag("market_PARIS"), "market_market_paris");
    }
}
