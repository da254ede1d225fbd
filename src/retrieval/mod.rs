//! Hybrid retrieval
//!
//! This module implements hybrid search over the keyword and vector
//! backends: query routing, expansion fanout, weighted score fusion,
//! near-duplicate suppression, optional reranking, and a relevance gate.

mod analyzer;
mod deduplication;
mod expansion;
mod fanout;
mod fusion;
mod gate;
mod hybrid;
mod reranker;

pub use analyzer::{analyze_query, QueryWeights};
pub use deduplication::{deduplicate, normalize_content};
pub use expansion::{expand_query, query_terms};
pub use fanout::{BranchHits, Fanout};
pub use fusion::{fuse, normalize_keyword_score, vector_similarity};
pub use gate::is_relevant;
pub use hybrid::{HybridSearcher, SearchOutcome};
pub use reranker::apply_rerank;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// One chunk moving through the retrieval pipeline.
///
/// `combined_score` is the fused branch score; `rerank_score` is only set
/// when a reranker scored the candidate. Ranking always reads
/// [`effective_score`](Self::effective_score).
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalCandidate {
    pub document_id: u64,
    pub chunk_id: String,
    pub content: String,
    pub combined_score: f32,
    pub rerank_score: Option<f32>,
    /// Smallest raw vector distance seen across branches, if any branch
    /// reached this chunk semantically
    pub vector_distance: Option<f32>,
}

impl RetrievalCandidate {
    pub fn new(document_id: u64, chunk_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            document_id,
            chunk_id: chunk_id.into(),
            content: content.into(),
            combined_score: 0.0,
            rerank_score: None,
            vector_distance: None,
        }
    }

    /// Rerank score when present, fused score otherwise
    pub fn effective_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.combined_score)
    }
}
