//! Local reference backends over the embedded database
//!
//! Brute-force implementations of the vector and keyword capabilities so the
//! engine works end to end with no external services. Linear scans are fine
//! at the corpus sizes a single-machine install holds; swap in a dedicated
//! search service through the same traits when they stop being fine.

use crate::backend::{
    BackendError, KeywordEntry, KeywordHit, KeywordSearch, VectorEntry, VectorHit, VectorSearch,
};
use crate::storage::Database;
use async_trait::async_trait;
use rusqlite::params;
use std::sync::Arc;

fn backend_err(capability: &'static str) -> impl Fn(rusqlite::Error) -> BackendError {
    move |e| BackendError::Unavailable {
        capability,
        reason: e.to_string(),
    }
}

fn conn_err(capability: &'static str, e: impl std::fmt::Display) -> BackendError {
    BackendError::Unavailable {
        capability,
        reason: e.to_string(),
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Vector search over one collection in the embeddings table
pub struct LocalVectorStore {
    db: Arc<Database>,
    collection: String,
}

impl LocalVectorStore {
    pub fn new(db: Arc<Database>, collection: impl Into<String>) -> Self {
        Self {
            db,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl VectorSearch for LocalVectorStore {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        document_filter: Option<u64>,
    ) -> Result<Vec<VectorHit>, BackendError> {
        if vector.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self
            .db
            .get_conn()
            .map_err(|e| conn_err("vector-search", e))?;

        let mut stmt = conn
            .prepare(
                "SELECT chunk_id, document_id, content, vector FROM embeddings
                 WHERE collection = ?1 AND (?2 IS NULL OR document_id = ?2)",
            )
            .map_err(backend_err("vector-search"))?;

        let rows = stmt
            .query_map(
                params![self.collection, document_filter.map(|id| id as i64)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .map_err(backend_err("vector-search"))?;

        let mut hits = Vec::new();
        for row in rows {
            let (chunk_id, document_id, content, blob) =
                row.map_err(backend_err("vector-search"))?;
            let stored = decode_vector(&blob);
            // Rows written under a different embedding dimension never match
            if stored.len() != vector.len() {
                continue;
            }
            hits.push(VectorHit {
                document_id: document_id as u64,
                chunk_id,
                content,
                distance: l2_distance(vector, &stored),
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn insert(&self, entries: &[VectorEntry]) -> Result<(), BackendError> {
        let mut conn = self
            .db
            .get_conn()
            .map_err(|e| conn_err("vector-search", e))?;
        let tx = conn.transaction().map_err(backend_err("vector-search"))?;

        for entry in entries {
            tx.execute(
                "INSERT OR REPLACE INTO embeddings
                 (collection, chunk_id, document_id, content, vector, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, strftime('%s', 'now'))",
                params![
                    self.collection,
                    entry.chunk_id,
                    entry.document_id as i64,
                    entry.content,
                    encode_vector(&entry.vector),
                ],
            )
            .map_err(backend_err("vector-search"))?;
        }

        tx.commit().map_err(backend_err("vector-search"))
    }

    async fn delete_document(&self, document_id: u64) -> Result<usize, BackendError> {
        let conn = self
            .db
            .get_conn()
            .map_err(|e| conn_err("vector-search", e))?;
        let affected = conn
            .execute(
                "DELETE FROM embeddings WHERE collection = ?1 AND document_id = ?2",
                params![self.collection, document_id as i64],
            )
            .map_err(backend_err("vector-search"))?;
        Ok(affected)
    }
}

/// Keyword search over the chunks table
pub struct LocalKeywordStore {
    db: Arc<Database>,
}

impl LocalKeywordStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

/// Terms to match against passage text: whitespace / CJK-punctuation tokens,
/// with bigrams added for unsegmented CJK runs so phrase queries still hit.
fn match_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in query
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || "，。、；：！？".contains(c))
        .filter(|t| !t.is_empty())
    {
        terms.push(token.to_string());

        let cjk: Vec<char> = token
            .chars()
            .filter(|c| ('\u{4e00}'..='\u{9fa5}').contains(c))
            .collect();
        if cjk.len() > 2 {
            for pair in cjk.windows(2) {
                terms.push(pair.iter().collect());
            }
        }
    }
    terms.dedup();
    terms
}

#[async_trait]
impl KeywordSearch for LocalKeywordStore {
    async fn search(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Result<Vec<KeywordHit>, BackendError> {
        let terms = match_terms(query);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self
            .db
            .get_conn()
            .map_err(|e| conn_err("keyword-search", e))?;

        let mut stmt = conn
            .prepare(
                "SELECT chunk_id, document_id, content FROM chunks
                 WHERE ?1 IS NULL OR document_id = ?1",
            )
            .map_err(backend_err("keyword-search"))?;

        let rows = stmt
            .query_map(params![document_filter.map(|id| id as i64)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(backend_err("keyword-search"))?;

        let mut hits = Vec::new();
        for row in rows {
            let (chunk_id, document_id, content) = row.map_err(backend_err("keyword-search"))?;
            let haystack = content.to_lowercase();
            let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
            if matched == 0 {
                continue;
            }
            hits.push(KeywordHit {
                document_id: document_id as u64,
                chunk_id,
                content,
                score: 100.0 * matched as f32 / terms.len() as f32,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn index(&self, entries: &[KeywordEntry]) -> Result<(), BackendError> {
        let mut conn = self
            .db
            .get_conn()
            .map_err(|e| conn_err("keyword-search", e))?;
        let tx = conn.transaction().map_err(backend_err("keyword-search"))?;

        for entry in entries {
            // Chunk ids carry their ordinal as the trailing `_{n}` segment
            let chunk_index: i64 = entry
                .chunk_id
                .rsplit_once('_')
                .and_then(|(_, n)| n.parse().ok())
                .unwrap_or(0);

            tx.execute(
                "INSERT OR REPLACE INTO chunks
                 (chunk_id, document_id, chunk_index, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now'))",
                params![
                    entry.chunk_id,
                    entry.document_id as i64,
                    chunk_index,
                    entry.content,
                ],
            )
            .map_err(backend_err("keyword-search"))?;
        }

        tx.commit().map_err(backend_err("keyword-search"))
    }

    async fn delete_document(&self, document_id: u64) -> Result<usize, BackendError> {
        let conn = self
            .db
            .get_conn()
            .map_err(|e| conn_err("keyword-search", e))?;
        let affected = conn
            .execute(
                "DELETE FROM chunks WHERE document_id = ?1",
                params![document_id as i64],
            )
            .map_err(backend_err("keyword-search"))?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn database() -> (TempDir, Arc<Database>) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
        (temp_dir, db)
    }

    fn vector_entry(document_id: u64, chunk_id: &str, content: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            document_id,
            chunk_id: chunk_id.to_string(),
            content: content.to_string(),
            vector,
        }
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_distance() {
        let (_dir, db) = database();
        let store = LocalVectorStore::new(db, "documents");

        store
            .insert(&[
                vector_entry(1, "1_1", "near", vec![1.0, 0.0]),
                vector_entry(1, "1_2", "far", vec![0.0, 5.0]),
                vector_entry(2, "2_1", "middle", vec![0.5, 0.5]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "1_1");
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].chunk_id, "2_1");
    }

    #[tokio::test]
    async fn test_vector_search_document_filter() {
        let (_dir, db) = database();
        let store = LocalVectorStore::new(db, "documents");

        store
            .insert(&[
                vector_entry(1, "1_1", "a", vec![1.0, 0.0]),
                vector_entry(2, "2_1", "b", vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, Some(2)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, 2);
    }

    #[tokio::test]
    async fn test_vector_collections_are_isolated() {
        let (_dir, db) = database();
        let documents = LocalVectorStore::new(db.clone(), "documents");
        let conversations = LocalVectorStore::new(db, "conversations");

        documents
            .insert(&[vector_entry(1, "1_1", "doc", vec![1.0])])
            .await
            .unwrap();

        let hits = conversations.search(&[1.0], 10, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_vector_dimension_mismatch_is_skipped() {
        let (_dir, db) = database();
        let store = LocalVectorStore::new(db, "documents");

        store
            .insert(&[
                vector_entry(1, "1_1", "old dim", vec![1.0, 0.0, 0.0]),
                vector_entry(1, "1_2", "new dim", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "1_2");
    }

    #[tokio::test]
    async fn test_vector_delete_document() {
        let (_dir, db) = database();
        let store = LocalVectorStore::new(db, "documents");

        store
            .insert(&[
                vector_entry(1, "1_1", "a", vec![1.0]),
                vector_entry(1, "1_2", "b", vec![2.0]),
                vector_entry(2, "2_1", "c", vec![3.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_document(1).await.unwrap(), 2);
        let hits = store.search(&[1.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, 2);
    }

    #[tokio::test]
    async fn test_keyword_search_scores_by_term_overlap() {
        let (_dir, db) = database();
        let store = LocalKeywordStore::new(db);

        store
            .index(&[
                KeywordEntry {
                    document_id: 1,
                    chunk_id: "1_1".to_string(),
                    content: "refund policy for damaged goods".to_string(),
                },
                KeywordEntry {
                    document_id: 1,
                    chunk_id: "1_2".to_string(),
                    content: "shipping times and carriers".to_string(),
                },
            ])
            .await
            .unwrap();

        let hits = store.search("refund policy", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "1_1");
        assert!(hits[0].score > 99.0);
    }

    #[tokio::test]
    async fn test_keyword_search_cjk_phrase() {
        let (_dir, db) = database();
        let store = LocalKeywordStore::new(db);

        store
            .index(&[KeywordEntry {
                document_id: 1,
                chunk_id: "1_1".to_string(),
                content: "退货流程需要七天处理".to_string(),
            }])
            .await
            .unwrap();

        let hits = store.search("如何退货", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_keyword_search_empty_query() {
        let (_dir, db) = database();
        let store = LocalKeywordStore::new(db);
        let hits = store.search("，。", None, 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
