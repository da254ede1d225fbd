//! Vector similarity search capability

use crate::backend::BackendError;
use async_trait::async_trait;

/// A single hit from a vector similarity search
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub document_id: u64,
    pub chunk_id: String,
    pub content: String,
    /// Raw distance in the backend's metric; smaller is closer
    pub distance: f32,
}

/// An entry to insert into a vector collection
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub document_id: u64,
    pub chunk_id: String,
    pub content: String,
    pub vector: Vec<f32>,
}

/// Similarity search over a single vector collection.
///
/// A handle is scoped to one collection; document passages and conversation
/// history live in separate collections so chat blobs can never surface in
/// document retrieval.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Nearest-neighbour search, optionally restricted to one document
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        document_filter: Option<u64>,
    ) -> Result<Vec<VectorHit>, BackendError>;

    /// Insert entries; an existing chunk_id is overwritten
    async fn insert(&self, entries: &[VectorEntry]) -> Result<(), BackendError>;

    /// Remove all entries belonging to a document, returning the count
    async fn delete_document(&self, document_id: u64) -> Result<usize, BackendError>;
}
