// 🔍 String Similarity - Edit distance + composite description score
//
// Descriptions on both sides are typed by hand, so matching mixes signals:
//   1. Exact match after normalization          → 1.0
//   2. Containment (substring or same words)    → 0.92
//   3. Composite, clipped to 1.0:
//        token Jaccard              × 0.6
//        longest shared window 8→4  × 0.3 (size / longest length)
//        edit-distance closeness    × 0.2 (only when both < 50 chars)

use crate::normalize::normalize;
use std::collections::HashSet;

// ============================================================================
// SCORING CONSTANTS
// ============================================================================

/// Score assigned when one description contains the other
pub const CONTAINMENT_SCORE: f64 = 0.92;

/// Weight of token-set Jaccard similarity
pub const TOKEN_WEIGHT: f64 = 0.6;

/// Weight of the longest shared window bonus
pub const WINDOW_WEIGHT: f64 = 0.3;

/// Weight of the edit-distance bonus
pub const EDIT_WEIGHT: f64 = 0.2;

/// Window sizes scanned for the shared-substring bonus (largest first)
pub const MAX_WINDOW: usize = 8;
pub const MIN_WINDOW: usize = 4;

/// Length gap above which `distance` skips the matrix
pub const LENGTH_GAP_CUTOFF: usize = 20;

/// Both strings must be shorter than this for the edit-distance bonus
pub const EDIT_BONUS_MAX_LEN: usize = 50;

/// Tokens must be longer than this to count ("de", "a", "x" are noise)
const MIN_TOKEN_LEN: usize = 2;

// ============================================================================
// EDIT DISTANCE
// ============================================================================

/// Levenshtein distance between two strings, counted in characters
///
/// When the lengths differ by more than 20 the longer length is returned
/// immediately. Such pairs are never useful matches.
///
/// Example:
/// - distance("mesa", "meza") = 1
/// - distance("", "mesa") = 4
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (len_a, len_b) = (a.len(), b.len());

    if len_a.abs_diff(len_b) > LENGTH_GAP_CUTOFF {
        return len_a.max(len_b);
    }
    if len_a == 0 {
        return len_b;
    }
    if len_b == 0 {
        return len_a;
    }

    // Two rows of the classic matrix are enough
    let mut previous: Vec<usize> = (0..=len_b).collect();
    let mut current = vec![0; len_b + 1];

    for i in 1..=len_a {
        current[0] = i;
        for j in 1..=len_b {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };

            current[j] = std::cmp::min(
                std::cmp::min(
                    previous[j] + 1,    // deletion
                    current[j - 1] + 1, // insertion
                ),
                previous[j - 1] + cost, // substitution
            );
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[len_b]
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Similarity of two free-text descriptions in [0, 1]
///
/// Symmetric. Empty input (after normalization) on either side scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a == b {
        return 1.0;
    }

    let tokens_a = tokens(&a);
    let tokens_b = tokens(&b);

    if a.contains(&b) || b.contains(&a) || same_tokens(&tokens_a, &tokens_b) {
        return CONTAINMENT_SCORE;
    }

    let chars_a: Vec<char> = a.chars().collect();
    let len_a = chars_a.len();
    let len_b = b.chars().count();
    let max_len = len_a.max(len_b);

    let mut score = jaccard(&tokens_a, &tokens_b) * TOKEN_WEIGHT;
    score += window_bonus(&chars_a, &b, max_len);

    if len_a < EDIT_BONUS_MAX_LEN && len_b < EDIT_BONUS_MAX_LEN {
        let closeness = 1.0 - distance(&a, &b) as f64 / max_len as f64;
        score += closeness * EDIT_WEIGHT;
    }

    score.min(1.0)
}

/// Significant words of a normalized string
fn tokens(s: &str) -> HashSet<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > MIN_TOKEN_LEN)
        .collect()
}

/// Same significant words, differing only in short words or spacing
fn same_tokens(a: &HashSet<&str>, b: &HashSet<&str>) -> bool {
    !a.is_empty() && a == b
}

/// Jaccard index of two token sets; two empty sets score 0
fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Bonus for the longest verbatim run (catalog codes, model numbers)
///
/// Scans window sizes 8 down to 4 and stops at the first size for which some
/// window of `a` occurs in `b`.
fn window_bonus(a: &[char], b: &str, max_len: usize) -> f64 {
    for size in (MIN_WINDOW..=MAX_WINDOW).rev() {
        if a.len() < size {
            continue;
        }

        let hit = a
            .windows(size)
            .any(|w| b.contains(w.iter().collect::<String>().as_str()));

        if hit {
            return size as f64 / max_len as f64 * WINDOW_WEIGHT;
        }
    }

    0.0
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance_basic() {
        assert_eq!(distance("mesa", "meza"), 1);
        assert_eq!(distance("mesa", "mesa"), 0);
        assert_eq!(distance("", "mesa"), 4);
        assert_eq!(distance("cadeira", ""), 7);
        assert_eq!(distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_distance_counts_characters_not_bytes() {
        assert_eq!(distance("reunião", "reuniao"), 1);
    }

    #[test]
    fn test_distance_length_gap_prefilter() {
        let short = "mesa";
        let long = "mesa de reuniao com tampo de vidro temperado";
        assert!(long.chars().count() - short.chars().count() > LENGTH_GAP_CUTOFF);

        assert_eq!(distance(short, long), long.chars().count());
        assert_eq!(distance(long, short), long.chars().count());
        assert_eq!(distance("", &"x".repeat(21)), 21);
    }

    #[test]
    fn test_similarity_exact_after_normalization() {
        assert_eq!(similarity("Mesa", "mesa"), 1.0);
        assert_eq!(similarity("Cadeira Giratória", "  cadeira giratoria "), 1.0);
    }

    #[test]
    fn test_similarity_containment() {
        assert_eq!(similarity("Mesa", "Mesa de reunião"), CONTAINMENT_SCORE);
        assert_eq!(similarity("Mesa de reunião", "Mesa"), CONTAINMENT_SCORE);
    }

    #[test]
    fn test_similarity_token_containment() {
        // "de" is not a significant token, so the token sets are equal
        let score = similarity("cadeira de escritorio", "cadeira escritorio");
        assert!(score > 0.9, "got {}", score);
    }

    #[test]
    fn test_similarity_extra_word_is_not_containment() {
        // Brand differs: one side has a significant word the other lacks
        let score = similarity("Monitor LG 24 polegadas", "Monitor Samsung 24 polegadas");
        assert!(score < CONTAINMENT_SCORE, "got {}", score);
        assert!(score < 0.65, "got {}", score);

        let score = similarity("cadeira escritorio", "cadeira escritorio presidente");
        assert_eq!(score, CONTAINMENT_SCORE);
    }

    #[test]
    fn test_similarity_empty_inputs() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("", "mesa"), 0.0);
        assert_eq!(similarity("mesa", "   "), 0.0);
    }

    #[test]
    fn test_similarity_typo_tolerated() {
        let score = similarity("impressora laser", "impresora laser");
        assert!(score > 0.5, "got {}", score);
        assert!(score < CONTAINMENT_SCORE, "got {}", score);
    }

    #[test]
    fn test_similarity_unrelated_is_low() {
        let score = similarity("mesa", "cadeira");
        assert!(score < 0.3, "got {}", score);
    }

    #[test]
    fn test_similarity_long_strings_skip_edit_bonus() {
        let a = "armario de aco com duas portas e quatro prateleiras cinza";
        let b = "armario de madeira com tres portas e gavetas marrom escuro";
        let score = similarity(a, b);
        assert!((0.0..=1.0).contains(&score));
        assert!(score < 0.6, "got {}", score);
    }

    proptest! {
        #[test]
        fn prop_similarity_is_symmetric(
            a in "[a-zA-Z0-9çãé ]{0,40}",
            b in "[a-zA-Z0-9çãé ]{0,40}"
        ) {
            prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }

        #[test]
        fn prop_similarity_is_bounded(a in "\\PC{0,60}", b in "\\PC{0,60}") {
            let score = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_similarity_identity(a in "[a-z]{1,10}( [a-z]{1,10}){0,3}") {
            prop_assert_eq!(similarity(&a, &a), 1.0);
        }

        #[test]
        fn prop_distance_prefilter_is_exact(a in "[a-z]{0,10}", extra in 21usize..40) {
            let b = format!("{}{}", a, "q".repeat(a.len() + extra));
            let expected = a.chars().count().max(b.chars().count());
            prop_assert_eq!(distance(&a, &b), expected);
        }
    }
}
