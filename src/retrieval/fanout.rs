//! Concurrent branch fanout
//!
//! Every expansion query runs one keyword search and one embed-then-search
//! vector call. All calls run concurrently under a per-call timeout; a
//! branch that fails or times out contributes nothing instead of failing
//! the whole retrieval.

use crate::backend::{KeywordHit, KeywordSearch, VectorHit, VectorSearch};
use crate::embedding::Embedder;
use futures::future;
use std::sync::Arc;
use std::time::Duration;

/// Raw hits from every branch of one fanout, before fusion
#[derive(Debug, Default)]
pub struct BranchHits {
    pub keyword_hits: Vec<KeywordHit>,
    pub vector_hits: Vec<VectorHit>,
}

/// Runs the per-query branch calls against the configured backends
pub struct Fanout {
    embedder: Arc<Embedder>,
    vectors: Arc<dyn VectorSearch>,
    keywords: Arc<dyn KeywordSearch>,
    call_timeout: Duration,
}

impl Fanout {
    pub fn new(
        embedder: Arc<Embedder>,
        vectors: Arc<dyn VectorSearch>,
        keywords: Arc<dyn KeywordSearch>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            vectors,
            keywords,
            call_timeout,
        }
    }

    /// Run all branches for the expansion set and collect their hits
    pub async fn run(
        &self,
        queries: &[String],
        per_query_k: usize,
        document_filter: Option<u64>,
    ) -> BranchHits {
        let keyword_futures = queries
            .iter()
            .map(|q| self.keyword_branch(q, document_filter, per_query_k));
        let vector_futures = queries
            .iter()
            .map(|q| self.vector_branch(q, document_filter, per_query_k));

        let (keyword_lists, vector_lists) = tokio::join!(
            future::join_all(keyword_futures),
            future::join_all(vector_futures)
        );

        BranchHits {
            keyword_hits: keyword_lists.into_iter().flatten().collect(),
            vector_hits: vector_lists.into_iter().flatten().collect(),
        }
    }

    async fn keyword_branch(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Vec<KeywordHit> {
        match tokio::time::timeout(
            self.call_timeout,
            self.keywords.search(query, document_filter, top_k),
        )
        .await
        {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!(query, error = %e, "keyword branch failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    query,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "keyword branch timed out"
                );
                Vec::new()
            }
        }
    }

    async fn vector_branch(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Vec<VectorHit> {
        let embed_and_search = async {
            let vector = self
                .embedder
                .embed(query)
                .await
                .map_err(|e| e.to_string())?;
            self.vectors
                .search(&vector, top_k, document_filter)
                .await
                .map_err(|e| e.to_string())
        };

        match tokio::time::timeout(self.call_timeout, embed_and_search).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!(query, error = %e, "vector branch failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    query,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "vector branch timed out"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, KeywordEntry, VectorEntry};
    use crate::embedding::HashEmbedder;
    use async_trait::async_trait;

    struct StubKeywords {
        hits: Vec<KeywordHit>,
    }

    #[async_trait]
    impl KeywordSearch for StubKeywords {
        async fn search(
            &self,
            _query: &str,
            _document_filter: Option<u64>,
            _top_k: usize,
        ) -> Result<Vec<KeywordHit>, BackendError> {
            Ok(self.hits.clone())
        }

        async fn index(&self, _entries: &[KeywordEntry]) -> Result<(), BackendError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: u64) -> Result<usize, BackendError> {
            Ok(0)
        }
    }

    struct SlowVectors;

    #[async_trait]
    impl VectorSearch for SlowVectors {
        async fn search(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _document_filter: Option<u64>,
        ) -> Result<Vec<VectorHit>, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn insert(&self, _entries: &[VectorEntry]) -> Result<(), BackendError> {
            Ok(())
        }

        async fn delete_document(&self, _document_id: u64) -> Result<usize, BackendError> {
            Ok(0)
        }
    }

    fn hit(chunk_id: &str, score: f32) -> KeywordHit {
        KeywordHit {
            document_id: 1,
            chunk_id: chunk_id.to_string(),
            content: "content".to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn test_timed_out_branch_contributes_nothing() {
        let embedder = Arc::new(
            Embedder::new(None, Some(HashEmbedder::new(4)), 4).unwrap(),
        );
        let fanout = Fanout::new(
            embedder,
            Arc::new(SlowVectors),
            Arc::new(StubKeywords {
                hits: vec![hit("1_1", 80.0)],
            }),
            Duration::from_millis(100),
        );

        let hits = fanout
            .run(&["refund policy".to_string()], 10, None)
            .await;

        // Keyword branch answered, vector branch hit the timeout
        assert_eq!(hits.keyword_hits.len(), 1);
        assert!(hits.vector_hits.is_empty());
    }

    #[tokio::test]
    async fn test_every_expansion_query_fans_out() {
        let embedder = Arc::new(
            Embedder::new(None, Some(HashEmbedder::new(4)), 4).unwrap(),
        );
        let fanout = Fanout::new(
            embedder,
            Arc::new(SlowVectors),
            Arc::new(StubKeywords {
                hits: vec![hit("1_1", 80.0)],
            }),
            Duration::from_millis(50),
        );

        let queries = vec![
            "退款 流程".to_string(),
            "退款".to_string(),
            "流程".to_string(),
        ];
        let hits = fanout.run(&queries, 10, None).await;

        // One keyword list per expansion query, flattened
        assert_eq!(hits.keyword_hits.len(), 3);
    }
}
