//! Keyword (full-text) search capability

use crate::backend::BackendError;
use async_trait::async_trait;

/// A single hit from a keyword search
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub document_id: u64,
    pub chunk_id: String,
    pub content: String,
    /// Backend-native relevance score; roughly 0-100, larger is better
    pub score: f32,
}

/// An entry to add to the keyword index
#[derive(Debug, Clone)]
pub struct KeywordEntry {
    pub document_id: u64,
    pub chunk_id: String,
    pub content: String,
}

/// Full-text search over indexed passages.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    /// Search for passages matching the query terms
    async fn search(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Result<Vec<KeywordHit>, BackendError>;

    /// Add entries to the index; an existing chunk_id is overwritten
    async fn index(&self, entries: &[KeywordEntry]) -> Result<(), BackendError>;

    /// Remove all entries belonging to a document, returning the count
    async fn delete_document(&self, document_id: u64) -> Result<usize, BackendError>;
}
