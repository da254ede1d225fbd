//! Near-duplicate suppression by content similarity
//!
//! Overlapping chunks and multi-branch fanout both surface passages that
//! repeat each other almost verbatim. Candidates whose normalized content
//! is nearly identical to an already-accepted one are dropped, first by
//! rank wins.

use crate::retrieval::RetrievalCandidate;
use ahash::AHashSet;

/// Lowercase, collapse whitespace runs to one space, trim
pub fn normalize_content(content: &str) -> String {
    content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn char_set(text: &str) -> AHashSet<char> {
    text.chars().collect()
}

/// Jaccard similarity over character sets; empty-either-side reads as 0
fn jaccard(a: &AHashSet<char>, b: &AHashSet<char>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.iter().filter(|c| b.contains(c)).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Drop candidates whose content is a near-duplicate of a higher-ranked
/// one. `threshold` is the Jaccard similarity above which two contents
/// count as the same passage. Input order is rank order and is preserved.
pub fn deduplicate(
    candidates: Vec<RetrievalCandidate>,
    threshold: f64,
) -> Vec<RetrievalCandidate> {
    let mut kept: Vec<RetrievalCandidate> = Vec::new();
    let mut kept_sets: Vec<AHashSet<char>> = Vec::new();

    for candidate in candidates {
        let set = char_set(&normalize_content(&candidate.content));
        let duplicate = kept_sets.iter().any(|seen| jaccard(seen, &set) > threshold);
        if !duplicate {
            kept.push(candidate);
            kept_sets.push(set);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(chunk_id: &str, content: &str, score: f32) -> RetrievalCandidate {
        let mut c = RetrievalCandidate::new(1, chunk_id, content);
        c.combined_score = score;
        c
    }

    #[test]
    fn test_near_identical_content_keeps_higher_ranked() {
        let candidates = vec![
            candidate("A", "退款需要七个工作日内完成处理流程说明", 0.9),
            candidate("B", "退款需要七个工作日内完成处理流程说明。", 0.5),
            candidate("C", "发货时间以仓库出库短信为准", 0.4),
        ];

        let kept = deduplicate(candidates, 0.8);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].chunk_id, "A");
        assert_eq!(kept[1].chunk_id, "C");
    }

    #[test]
    fn test_case_and_whitespace_are_ignored() {
        let candidates = vec![
            candidate("A", "Refund Policy   For Orders", 0.9),
            candidate("B", "refund policy for orders", 0.5),
        ];

        let kept = deduplicate(candidates, 0.8);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk_id, "A");
    }

    #[test]
    fn test_distinct_content_survives() {
        let candidates = vec![
            candidate("A", "alpha bravo charlie delta", 0.9),
            candidate("B", "zulu yankee xray whiskey", 0.5),
        ];

        let kept = deduplicate(candidates, 0.8);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let candidates = vec![
            candidate("A", "alpha bravo charlie delta", 0.9),
            candidate("B", "alpha bravo charlie delta echo", 0.8),
            candidate("C", "zulu yankee xray whiskey", 0.5),
        ];

        let once = deduplicate(candidates, 0.8);
        let twice = deduplicate(once.clone(), 0.8);

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.chunk_id, b.chunk_id);
        }
    }

    #[test]
    fn test_empty_content_is_never_a_duplicate() {
        let candidates = vec![
            candidate("A", "", 0.9),
            candidate("B", "", 0.8),
        ];

        let kept = deduplicate(candidates, 0.8);
        assert_eq!(kept.len(), 2);
    }
}
