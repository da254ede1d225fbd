//! Long-term conversational memory (tier two)
//!
//! Past turns stored as embedded question/answer blobs in a vector
//! collection reserved for conversations, so chat history can be recalled
//! by meaning long after it has left the short-term window. The collection
//! is shared across users; ids carry the owning (user, scope) pair and
//! retrieval post-filters on that prefix.

use crate::backend::{VectorEntry, VectorSearch};
use crate::embedding::Embedder;
use crate::memory::{scope_label, MemoryError};
use crate::retrieval::vector_similarity;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

const QUESTION_PREFIX: &str = "Q: ";
const ANSWER_DELIMITER: &str = "\nA: ";

/// Ids look like `chat_{user}_{scope}_{timestamp_millis}`
const ID_PREFIX: &str = "chat_";

/// Search this many times `top_k` before post-filtering by owner
const OVERSAMPLE: usize = 4;

/// Document id recorded for conversation vectors with no document scope
const GENERAL_SENTINEL: u64 = 0;

/// One recalled exchange
#[derive(Debug, Clone)]
pub struct HistoricalTurn {
    pub question: String,
    pub answer: String,
    /// Similarity of the whole blob to the current query, in (0, 1]
    pub similarity: f32,
    pub timestamp_millis: i64,
}

/// Semantic recall over a dedicated conversation vector collection
pub struct LongTermMemory {
    embedder: Arc<Embedder>,
    vectors: Arc<dyn VectorSearch>,
    top_k: usize,
}

impl LongTermMemory {
    pub fn new(embedder: Arc<Embedder>, vectors: Arc<dyn VectorSearch>, top_k: usize) -> Self {
        Self {
            embedder,
            vectors,
            top_k,
        }
    }

    fn owner_prefix(user_id: u64, document_id: Option<u64>) -> String {
        format!("{}{}_{}_", ID_PREFIX, user_id, scope_label(document_id))
    }

    fn conversation_id(user_id: u64, document_id: Option<u64>) -> String {
        format!(
            "{}{}",
            Self::owner_prefix(user_id, document_id),
            Utc::now().timestamp_millis()
        )
    }

    fn render_blob(question: &str, answer: &str) -> String {
        format!("{QUESTION_PREFIX}{question}{ANSWER_DELIMITER}{answer}")
    }

    /// Split a stored blob back into its question and answer parts. Content
    /// that does not carry the delimiter is treated as a bare question.
    fn parse_blob(content: &str) -> (String, String) {
        if let Some(stripped) = content.strip_prefix(QUESTION_PREFIX) {
            if let Some(at) = stripped.find(ANSWER_DELIMITER) {
                let question = stripped[..at].to_string();
                let answer = stripped[at + ANSWER_DELIMITER.len()..].to_string();
                return (question, answer);
            }
        }
        (content.to_string(), String::new())
    }

    fn parse_timestamp(id: &str) -> i64 {
        id.rsplit('_')
            .next()
            .and_then(|suffix| suffix.parse().ok())
            .unwrap_or_else(|| Utc::now().timestamp_millis())
    }

    /// Embed and store one completed turn
    pub async fn save(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        question: &str,
        answer: &str,
    ) -> Result<(), MemoryError> {
        let blob = Self::render_blob(question, answer);
        let vector = self.embedder.embed(&blob).await?;
        let chunk_id = Self::conversation_id(user_id, document_id);

        let entry = VectorEntry {
            document_id: document_id.unwrap_or(GENERAL_SENTINEL),
            chunk_id: chunk_id.clone(),
            content: blob,
            vector,
        };
        self.vectors.insert(&[entry]).await?;

        debug!(chunk_id = %chunk_id, "saved turn to long-term memory");
        Ok(())
    }

    /// Recall the turns most similar to the current query for one owner.
    ///
    /// The collection holds every user's history, so the search oversamples
    /// and then keeps only ids belonging to this (user, scope) pair, capped
    /// at `top_k`.
    pub async fn retrieve(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        query: &str,
    ) -> Result<Vec<HistoricalTurn>, MemoryError> {
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .vectors
            .search(&vector, self.top_k * OVERSAMPLE, None)
            .await?;

        let prefix = Self::owner_prefix(user_id, document_id);
        let turns: Vec<HistoricalTurn> = hits
            .into_iter()
            .filter(|hit| hit.chunk_id.starts_with(&prefix))
            .take(self.top_k)
            .map(|hit| {
                let (question, answer) = Self::parse_blob(&hit.content);
                HistoricalTurn {
                    question,
                    answer,
                    similarity: vector_similarity(hit.distance),
                    timestamp_millis: Self::parse_timestamp(&hit.chunk_id),
                }
            })
            .collect();

        debug!(
            user_id,
            scope = %scope_label(document_id),
            count = turns.len(),
            "recalled long-term turns"
        );
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalVectorStore;
    use crate::embedding::HashEmbedder;
    use crate::storage::Database;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LongTermMemory) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("test.db")).unwrap());
        let vectors = Arc::new(LocalVectorStore::new(db, "conversations"));
        let embedder = Arc::new(
            Embedder::new(None, Some(HashEmbedder::new(32)), 32).unwrap(),
        );
        (dir, LongTermMemory::new(embedder, vectors, 3))
    }

    #[tokio::test]
    async fn test_save_then_retrieve_reconstructs_turn() {
        let (_dir, ltm) = setup();
        ltm.save(1, Some(7), "How do refunds work?", "Within thirty days.")
            .await
            .unwrap();

        let turns = ltm.retrieve(1, Some(7), "refund process").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].question, "How do refunds work?");
        assert_eq!(turns[0].answer, "Within thirty days.");
        assert!(turns[0].similarity > 0.0 && turns[0].similarity <= 1.0);
        assert!(turns[0].timestamp_millis > 0);
    }

    #[tokio::test]
    async fn test_retrieve_filters_to_owner_and_scope() {
        let (_dir, ltm) = setup();
        ltm.save(1, Some(7), "mine scoped", "a").await.unwrap();
        ltm.save(1, None, "mine general", "a").await.unwrap();
        ltm.save(2, Some(7), "someone else", "a").await.unwrap();

        let turns = ltm.retrieve(1, Some(7), "anything at all").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].question, "mine scoped");

        let general = ltm.retrieve(1, None, "anything at all").await.unwrap();
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].question, "mine general");
    }

    #[tokio::test]
    async fn test_retrieve_caps_at_top_k() {
        let (_dir, ltm) = setup();
        for i in 0..6 {
            ltm.save(1, None, &format!("question number {i}"), "answer")
                .await
                .unwrap();
            // ids are timestamped to the millisecond; keep them distinct
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let turns = ltm.retrieve(1, None, "question").await.unwrap();
        assert_eq!(turns.len(), 3);
    }

    #[test]
    fn test_parse_blob_without_delimiter_is_bare_question() {
        let (question, answer) = LongTermMemory::parse_blob("free-form note");
        assert_eq!(question, "free-form note");
        assert_eq!(answer, "");
    }

    #[test]
    fn test_parse_blob_preserves_multiline_answer() {
        let blob = LongTermMemory::render_blob("q", "line one\nline two");
        let (question, answer) = LongTermMemory::parse_blob(&blob);
        assert_eq!(question, "q");
        assert_eq!(answer, "line one\nline two");
    }

    #[test]
    fn test_timestamp_parsed_from_id_suffix() {
        assert_eq!(LongTermMemory::parse_timestamp("chat_1_7_1700000000123"), 1700000000123);
        assert_eq!(
            LongTermMemory::parse_timestamp("chat_9_general_42"),
            42
        );
    }
}
