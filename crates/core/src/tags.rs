//! Tag frequency ranking for discovery and autocomplete views.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

/// Frequency-count tags across a corpus.
pub fn count_tags<I, S>(tags: I) -> HashMap<String, u64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for tag in tags {
        *counts.entry(tag.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Top `k` tags by count descending, ties broken by lexicographic tag
/// order. The result is user-visible and must not flap between identical
/// requests, so the ordering is total.
pub fn top_k(counts: &HashMap<String, u64>, k: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts
        .iter()
        .map(|(tag, count)| (tag.clone(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

/// Count and rank in one pass.
pub fn rank_tags<I, S>(tags: I, k: usize) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    top_k(&count_tags(tags), k)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_repeated_tags() {
        let counts = count_tags(["fitness", "sleep", "fitness"]);
        assert_eq!(counts["fitness"], 2);
        assert_eq!(counts["sleep"], 1);
    }

    #[test]
    fn orders_by_count_descending() {
        let ranked = rank_tags(
            ["sleep", "fitness", "fitness", "fitness", "sleep", "water"],
            10,
        );
        assert_eq!(
            ranked,
            vec![
                ("fitness".to_string(), 3),
                ("sleep".to_string(), 2),
                ("water".to_string(), 1),
            ]
        );
    }

    #[test]
    fn ties_break_lexicographically() {
        let ranked = rank_tags(["zebra", "apple", "mango"], 10);
        assert_eq!(
            ranked,
            vec![
                ("apple".to_string(), 1),
                ("mango".to_string(), 1),
                ("zebra".to_string(), 1),
            ]
        );
    }

    #[test]
    fn truncates_to_k() {
        let ranked = rank_tags(["a", "b", "c", "d"], 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn k_larger_than_distinct_returns_all() {
        let ranked = rank_tags(["a", "b"], 100);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn zero_k_returns_empty() {
        assert!(rank_tags(["a", "b"], 0).is_empty());
    }

    #[test]
    fn empty_corpus_returns_empty() {
        let empty: [&str; 0] = [];
        assert!(rank_tags(empty, 5).is_empty());
    }

    #[test]
    fn identical_requests_never_flap() {
        let corpus = ["a", "b", "b", "c", "c", "d", "d"];
        let first = rank_tags(corpus, 3);
        let second = rank_tags(corpus, 3);
        assert_eq!(first, second);
        assert_eq!(first[0], ("b".to_string(), 2));
        assert_eq!(first[1], ("c".to_string(), 2));
        assert_eq!(first[2], ("d".to_string(), 2));
    }
}
