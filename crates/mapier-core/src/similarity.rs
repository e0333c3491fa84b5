//! Place name normalization and similarity scoring.
//!
//! Similarity is the maximum of two symmetric measures over normalized
//! names:
//!
//! - pg_trgm-style trigram similarity (Jaccard over padded word trigrams),
//!   which tolerates word reordering and extra words.
//! - Normalized Levenshtein similarity over token-sorted names, which
//!   tolerates small spelling differences.
//!
//! Both are symmetric and deterministic, so the maximum is too.

use std::collections::BTreeSet;

/// Case-fold, strip punctuation and collapse whitespace.
///
/// Apostrophes are removed rather than turned into separators so that
/// "Joe's" and "Joes" normalize identically.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch == '\'' || ch == '\u{2019}' {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Similarity of two place names in [0, 1].
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    normalized_similarity(&a, &b)
}

/// Similarity of two already-normalized names.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let trigram = trigram_similarity(a, b);
    let edit = strsim::normalized_levenshtein(&sort_tokens(a), &sort_tokens(b));
    trigram.max(edit)
}

/// pg_trgm-compatible trigram similarity: each word is padded with two
/// leading spaces and one trailing space before trigrams are taken.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f64 / union as f64
}

fn trigrams(s: &str) -> BTreeSet<[char; 3]> {
    let mut set = BTreeSet::new();
    for word in s.split_whitespace() {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for w in padded.windows(3) {
            set.insert([w[0], w[1], w[2]]);
        }
    }
    set
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Blue   Bottle Coffee! "), "blue bottle coffee");
        assert_eq!(normalize_name("Joe's Pizza"), "joes pizza");
        assert_eq!(normalize_name("CAFÉ-Bar"), "café bar");
        assert_eq!(normalize_name("!!!"), "");
    }

    #[test]
    fn test_identical_after_normalization() {
        assert_eq!(name_similarity("Blue Bottle Coffee", "blue bottle coffee."), 1.0);
    }

    #[test]
    fn test_empty_names_score_zero() {
        assert_eq!(name_similarity("", "Starbucks"), 0.0);
        assert_eq!(name_similarity("...", "..."), 0.0);
    }

    #[test]
    fn test_word_order_tolerated() {
        let s = name_similarity("Coffee Blue Bottle", "Blue Bottle Coffee");
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_minor_spelling_tolerated() {
        let s = name_similarity("Starbucks", "Starbuck's Coffee");
        assert!(s > 0.5, "got {}", s);
        let s = name_similarity("Blue Botle Coffee", "Blue Bottle Coffee");
        assert!(s > 0.9, "got {}", s);
    }

    #[test]
    fn test_distinct_businesses_score_low() {
        let s = name_similarity("Blue Bottle Coffee", "Chase Bank");
        assert!(s < 0.3, "got {}", s);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("Starbucks Reserve", "Starbucks"),
            ("McDonald's", "Mc Donalds"),
            ("Pret A Manger", "Pret"),
        ];
        for (a, b) in pairs {
            assert_eq!(name_similarity(a, b), name_similarity(b, a), "{} / {}", a, b);
        }
    }

    #[test]
    fn test_trigram_matches_pg_trgm_example() {
        // pg_trgm: similarity('word', 'two words') = 0.36363637
        let s = trigram_similarity("word", "two words");
        assert!((s - 4.0 / 11.0).abs() < 1e-9, "got {}", s);
    }
}
