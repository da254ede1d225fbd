//! Hybrid search pipeline
//!
//! Routes, expands, fans out, fuses, deduplicates, truncates, reranks.
//! Membership of the result set is fixed before the reranker runs, so a
//! flaky reranker can only change ordering, never which passages answer.

use crate::backend::{KeywordSearch, RerankProvider, VectorSearch};
use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::retrieval::{
    analyze_query, apply_rerank, deduplicate, expand_query, fuse, is_relevant, Fanout,
    RetrievalCandidate, SearchError,
};
use std::sync::Arc;
use std::time::Duration;

/// Result of a gated search: the ranked passages plus whether the top of
/// the ranking is actually about the query
#[derive(Debug)]
pub struct SearchOutcome {
    pub candidates: Vec<RetrievalCandidate>,
    pub relevant: bool,
}

/// Hybrid searcher over the document collection
pub struct HybridSearcher {
    fanout: Fanout,
    reranker: Option<Arc<dyn RerankProvider>>,
    config: RetrievalConfig,
}

impl HybridSearcher {
    pub fn new(
        embedder: Arc<Embedder>,
        vectors: Arc<dyn VectorSearch>,
        keywords: Arc<dyn KeywordSearch>,
        reranker: Option<Arc<dyn RerankProvider>>,
        config: RetrievalConfig,
    ) -> Self {
        let fanout = Fanout::new(
            embedder,
            vectors,
            keywords,
            Duration::from_millis(config.call_timeout_ms),
        );
        Self {
            fanout,
            reranker,
            config,
        }
    }

    /// Perform hybrid search, returning at most `top_k` ranked candidates
    pub async fn search(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query text cannot be empty".to_string(),
            ));
        }

        // Step 1: route weights by query shape
        let weights = analyze_query(query);

        // Step 2: expand into keyword variants
        let queries = expand_query(query);

        // Step 3: concurrent fanout over both branches
        let per_query_k = top_k * self.config.fanout_multiplier;
        let hits = self.fanout.run(&queries, per_query_k, document_filter).await;

        // Step 4: weighted score fusion
        let candidates = fuse(&hits, &weights);

        // Step 5: drop near-duplicates, then cut to top_k
        let mut candidates = deduplicate(candidates, self.config.dedup_threshold);
        candidates.truncate(top_k);

        // Step 6: optional precision pass, order only
        let candidates = apply_rerank(self.reranker.as_ref(), query, candidates).await;

        tracing::debug!(
            query,
            results = candidates.len(),
            reranked = self.reranker.is_some(),
            "hybrid search complete"
        );
        Ok(candidates)
    }

    /// Search and gate: also reports whether the results are worth
    /// grounding an answer in
    pub async fn search_gated(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Result<SearchOutcome, SearchError> {
        let candidates = self.search(query, document_filter, top_k).await?;
        let relevant = is_relevant(
            query,
            &candidates,
            self.config.gate_min_score,
            self.config.gate_max_distance,
        );
        Ok(SearchOutcome {
            candidates,
            relevant,
        })
    }
}
