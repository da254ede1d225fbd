//! Document ingestion
//!
//! Takes raw document text through clean → chunk → index: chunk contents go
//! to the keyword index, embedding vectors to the document vector
//! collection, and the document itself into the registry.

pub mod chunker;

pub use chunker::{clean_text, Chunker, TextChunk};

use crate::backend::{BackendError, KeywordEntry, KeywordSearch, VectorEntry, VectorSearch};
use crate::embedding::{EmbedError, Embedder};
use crate::error::Result;
use crate::storage::Database;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("document is empty after cleaning")]
    EmptyDocument,

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Outcome of one ingest call
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: u64,
    pub chunk_count: usize,
}

/// Ingestion pipeline over the document collection
pub struct Ingestor {
    db: Arc<Database>,
    chunker: Chunker,
    embedder: Arc<Embedder>,
    vectors: Arc<dyn VectorSearch>,
    keywords: Arc<dyn KeywordSearch>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        db: Arc<Database>,
        chunker: Chunker,
        embedder: Arc<Embedder>,
        vectors: Arc<dyn VectorSearch>,
        keywords: Arc<dyn KeywordSearch>,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            chunker,
            embedder,
            vectors,
            keywords,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest one document. The document is registered first; a document
    /// shorter than the chunk minimum ends up registered with zero chunks.
    pub async fn ingest(&self, name: &str, raw_text: &str) -> Result<IngestReport> {
        let cleaned = clean_text(raw_text);
        if cleaned.is_empty() {
            return Err(IngestError::EmptyDocument.into());
        }

        let document_id = self.db.insert_document(name)?;
        let chunks = self.chunker.split(&cleaned, document_id);

        if chunks.is_empty() {
            tracing::warn!(
                document_id,
                name,
                "document shorter than the chunk minimum, nothing indexed"
            );
            return Ok(IngestReport {
                document_id,
                chunk_count: 0,
            });
        }

        let keyword_entries: Vec<KeywordEntry> = chunks
            .iter()
            .map(|chunk| KeywordEntry {
                document_id: chunk.document_id,
                chunk_id: chunk.chunk_id.clone(),
                content: chunk.content.clone(),
            })
            .collect();
        self.keywords
            .index(&keyword_entries)
            .await
            .map_err(IngestError::from)?;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(IngestError::from)?;

            let entries: Vec<VectorEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorEntry {
                    document_id: chunk.document_id,
                    chunk_id: chunk.chunk_id.clone(),
                    content: chunk.content.clone(),
                    vector,
                })
                .collect();
            self.vectors
                .insert(&entries)
                .await
                .map_err(IngestError::from)?;
        }

        self.db.set_chunk_count(document_id, chunks.len())?;
        tracing::info!(document_id, name, chunks = chunks.len(), "document ingested");

        Ok(IngestReport {
            document_id,
            chunk_count: chunks.len(),
        })
    }

    /// Remove a document and everything indexed from it.
    /// Returns false when the id was never registered.
    pub async fn remove(&self, document_id: u64) -> Result<bool> {
        let vectors = self
            .vectors
            .delete_document(document_id)
            .await
            .map_err(IngestError::from)?;
        let chunks = self
            .keywords
            .delete_document(document_id)
            .await
            .map_err(IngestError::from)?;
        let existed = self.db.delete_document(document_id)?;

        if existed {
            tracing::info!(document_id, chunks, vectors, "document removed");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalKeywordStore, LocalVectorStore};
    use crate::embedding::HashEmbedder;
    use tempfile::TempDir;

    fn pipeline() -> (TempDir, Ingestor, Arc<dyn VectorSearch>, Arc<dyn KeywordSearch>) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());

        let embedder = Arc::new(
            Embedder::new(None, Some(HashEmbedder::new(16)), 16).unwrap(),
        );
        let vectors: Arc<dyn VectorSearch> =
            Arc::new(LocalVectorStore::new(db.clone(), "documents"));
        let keywords: Arc<dyn KeywordSearch> = Arc::new(LocalKeywordStore::new(db.clone()));

        let ingestor = Ingestor::new(
            db,
            Chunker::new(200, 500, 50),
            embedder,
            vectors.clone(),
            keywords.clone(),
            4,
        );
        (temp_dir, ingestor, vectors, keywords)
    }

    fn long_text() -> String {
        let para_a: String = std::iter::repeat("alpha beaver canyon ")
            .take(15)
            .collect();
        let para_b: String = std::iter::repeat("delta recall window ")
            .take(15)
            .collect();
        format!("{}\n\n{}", para_a.trim(), para_b.trim())
    }

    #[tokio::test]
    async fn test_ingest_indexes_both_branches() {
        let (_dir, ingestor, vectors, keywords) = pipeline();

        let report = ingestor.ingest("guide.txt", &long_text()).await.unwrap();
        assert_eq!(report.chunk_count, 2);

        let hits = keywords.search("beaver canyon", None, 10).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].document_id, report.document_id);

        let embedder = HashEmbedder::new(16);
        let query = embedder.embed("anything");
        let vector_hits = vectors.search(&query, 10, None).await.unwrap();
        assert_eq!(vector_hits.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_rejects_blank_document() {
        let (_dir, ingestor, _vectors, _keywords) = pipeline();
        assert!(ingestor.ingest("empty.txt", "  \n  ").await.is_err());
    }

    #[tokio::test]
    async fn test_short_document_registers_with_zero_chunks() {
        let (_dir, ingestor, _vectors, keywords) = pipeline();

        let report = ingestor.ingest("note.txt", "a short note").await.unwrap();
        assert_eq!(report.chunk_count, 0);

        let hits = keywords.search("short note", None, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_remove_clears_all_traces() {
        let (_dir, ingestor, vectors, keywords) = pipeline();

        let report = ingestor.ingest("guide.txt", &long_text()).await.unwrap();
        assert!(ingestor.remove(report.document_id).await.unwrap());

        let hits = keywords.search("beaver", None, 10).await.unwrap();
        assert!(hits.is_empty());
        let embedder = HashEmbedder::new(16);
        let vector_hits = vectors
            .search(&embedder.embed("anything"), 10, None)
            .await
            .unwrap();
        assert!(vector_hits.is_empty());

        assert!(!ingestor.remove(report.document_id).await.unwrap());
    }
}
