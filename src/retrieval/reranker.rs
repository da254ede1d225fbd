//! Precision reranking pass
//!
//! Hands the already-selected candidates to a cross-encoder service for a
//! second scoring. Reranking reorders; it never adds or removes
//! candidates, and any failure falls back to the fused order so retrieval
//! keeps working when the reranker is down.

use crate::backend::RerankProvider;
use crate::retrieval::RetrievalCandidate;
use std::sync::Arc;

/// Apply the optional reranker to a fused, truncated candidate list.
///
/// Scored candidates sort by rerank score, unscored ones keep their fused
/// score; the sort key is [`RetrievalCandidate::effective_score`] either
/// way.
pub async fn apply_rerank(
    reranker: Option<&Arc<dyn RerankProvider>>,
    query: &str,
    mut candidates: Vec<RetrievalCandidate>,
) -> Vec<RetrievalCandidate> {
    let Some(reranker) = reranker else {
        return candidates;
    };
    if candidates.len() < 2 {
        return candidates;
    }

    let documents: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
    match reranker.rerank(query, &documents).await {
        Ok(scores) => {
            for score in scores {
                if let Some(candidate) = candidates.get_mut(score.index) {
                    candidate.rerank_score = Some(score.score);
                }
            }
            candidates.sort_by(|a, b| {
                b.effective_score()
                    .partial_cmp(&a.effective_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            candidates
        }
        Err(e) => {
            tracing::warn!(error = %e, "reranker failed, keeping fused order");
            candidates
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, RerankScore};
    use async_trait::async_trait;

    struct ScriptedReranker {
        scores: Vec<RerankScore>,
    }

    #[async_trait]
    impl RerankProvider for ScriptedReranker {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[&str],
        ) -> Result<Vec<RerankScore>, BackendError> {
            Ok(self.scores.clone())
        }
    }

    struct BrokenReranker;

    #[async_trait]
    impl RerankProvider for BrokenReranker {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[&str],
        ) -> Result<Vec<RerankScore>, BackendError> {
            Err(BackendError::Unavailable {
                capability: "rerank",
                reason: "service down".to_string(),
            })
        }
    }

    fn candidates() -> Vec<RetrievalCandidate> {
        let mut a = RetrievalCandidate::new(1, "A", "first passage");
        a.combined_score = 0.9;
        let mut b = RetrievalCandidate::new(1, "B", "second passage");
        b.combined_score = 0.6;
        vec![a, b]
    }

    #[tokio::test]
    async fn test_no_reranker_keeps_fused_order() {
        let result = apply_rerank(None, "q", candidates()).await;
        assert_eq!(result[0].chunk_id, "A");
        assert!(result[0].rerank_score.is_none());
    }

    #[tokio::test]
    async fn test_rerank_reorders_without_changing_membership() {
        let reranker: Arc<dyn RerankProvider> = Arc::new(ScriptedReranker {
            scores: vec![
                RerankScore {
                    index: 0,
                    score: 0.1,
                },
                RerankScore {
                    index: 1,
                    score: 0.95,
                },
            ],
        });

        let result = apply_rerank(Some(&reranker), "q", candidates()).await;

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].chunk_id, "B");
        assert_eq!(result[0].rerank_score, Some(0.95));
        assert_eq!(result[1].chunk_id, "A");
    }

    #[tokio::test]
    async fn test_partial_scores_mix_with_fused() {
        // Only B gets a rerank score; A keeps its fused 0.9 and still wins
        let reranker: Arc<dyn RerankProvider> = Arc::new(ScriptedReranker {
            scores: vec![RerankScore {
                index: 1,
                score: 0.7,
            }],
        });

        let result = apply_rerank(Some(&reranker), "q", candidates()).await;

        assert_eq!(result[0].chunk_id, "A");
        assert!(result[0].rerank_score.is_none());
        assert_eq!(result[1].rerank_score, Some(0.7));
    }

    #[tokio::test]
    async fn test_failure_keeps_fused_order() {
        let reranker: Arc<dyn RerankProvider> = Arc::new(BrokenReranker);
        let result = apply_rerank(Some(&reranker), "q", candidates()).await;

        assert_eq!(result[0].chunk_id, "A");
        assert_eq!(result[1].chunk_id, "B");
        assert!(result.iter().all(|c| c.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_single_candidate_skips_the_call() {
        let reranker: Arc<dyn RerankProvider> = Arc::new(BrokenReranker);
        let single = vec![candidates().remove(0)];
        let result = apply_rerank(Some(&reranker), "q", single).await;
        assert_eq!(result.len(), 1);
    }
}
