//! Relevance gate
//!
//! Decides whether retrieval actually found something about the query, or
//! whether the engine should answer from general knowledge instead of
//! forcing unrelated passages into the prompt.

use crate::retrieval::{query_terms, RetrievalCandidate};

/// Does any query term of two or more code points appear in the content?
fn has_lexical_overlap(query: &str, content: &str) -> bool {
    let haystack = content.to_lowercase();
    query_terms(query)
        .iter()
        .any(|term| haystack.contains(&term.to_lowercase()))
}

/// Gate on the top candidate.
///
/// Passes when its effective score clears `min_score`. Without a rerank
/// score the fused score alone is a weak signal, so a second route exists:
/// a close vector distance (under `max_distance`) combined with lexical
/// overlap between query and content also passes. An empty candidate list
/// never passes.
pub fn is_relevant(
    query: &str,
    candidates: &[RetrievalCandidate],
    min_score: f32,
    max_distance: f32,
) -> bool {
    let Some(top) = candidates.first() else {
        return false;
    };

    if top.effective_score() > min_score {
        return true;
    }

    top.rerank_score.is_none()
        && top
            .vector_distance
            .map_or(false, |distance| distance < max_distance)
        && has_lexical_overlap(query, &top.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        combined: f32,
        rerank: Option<f32>,
        distance: Option<f32>,
        content: &str,
    ) -> RetrievalCandidate {
        let mut c = RetrievalCandidate::new(1, "1_1", content);
        c.combined_score = combined;
        c.rerank_score = rerank;
        c.vector_distance = distance;
        c
    }

    #[test]
    fn test_empty_candidates_never_pass() {
        assert!(!is_relevant("退款", &[], 0.3, 2.0));
    }

    #[test]
    fn test_score_above_threshold_passes() {
        let candidates = vec![candidate(0.5, None, None, "无关内容")];
        assert!(is_relevant("退款", &candidates, 0.3, 2.0));
    }

    #[test]
    fn test_low_score_with_overlap_and_close_distance_passes() {
        let candidates = vec![candidate(0.2, None, Some(1.5), "退款需要七个工作日")];
        assert!(is_relevant("退款 流程", &candidates, 0.3, 2.0));
    }

    #[test]
    fn test_low_score_without_overlap_fails() {
        let candidates = vec![candidate(0.2, None, Some(1.5), "发货时间说明")];
        assert!(!is_relevant("退款", &candidates, 0.3, 2.0));
    }

    #[test]
    fn test_low_score_with_far_distance_fails() {
        let candidates = vec![candidate(0.2, None, Some(3.0), "退款需要七个工作日")];
        assert!(!is_relevant("退款", &candidates, 0.3, 2.0));
    }

    #[test]
    fn test_reranked_low_score_skips_fallback_route() {
        // A reranker already judged this pair; a low rerank score is final
        let candidates = vec![candidate(0.9, Some(0.1), Some(0.5), "退款需要七个工作日")];
        assert!(!is_relevant("退款", &candidates, 0.3, 2.0));
    }

    #[test]
    fn test_overlap_is_case_insensitive() {
        let candidates = vec![candidate(0.2, None, Some(1.0), "REFUND takes seven days")];
        assert!(is_relevant("refund process", &candidates, 0.3, 2.0));
    }

    #[test]
    fn test_keyword_only_hit_has_no_distance() {
        // Never reached by the vector branch: distance route unavailable
        let candidates = vec![candidate(0.2, None, None, "退款需要七个工作日")];
        assert!(!is_relevant("退款", &candidates, 0.3, 2.0));
    }
}
