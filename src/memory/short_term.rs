//! Short-term conversational memory (tier one)
//!
//! A sliding window of the most recent turns, kept verbatim per
//! (user, document) conversation in the durable memory store. Each turn
//! appends a user message and an assistant message; the list is trimmed to
//! the last `2 × window` messages and carries a TTL refreshed on every
//! append, so idle conversations age out on their own.

use crate::backend::{ChatMessage, MemoryStore};
use crate::memory::{scope_label, MemoryError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "chat:short_term:";

/// Sliding-window turn history backed by a [`MemoryStore`] list
pub struct ShortTermMemory {
    store: Arc<dyn MemoryStore>,
    window: usize,
    ttl: Duration,
}

impl ShortTermMemory {
    pub fn new(store: Arc<dyn MemoryStore>, window: usize, ttl: Duration) -> Self {
        Self { store, window, ttl }
    }

    fn key(user_id: u64, document_id: Option<u64>) -> String {
        format!("{}{}:{}", KEY_PREFIX, user_id, scope_label(document_id))
    }

    /// Messages the window may hold: each turn is a user/assistant pair
    fn capacity(&self) -> usize {
        self.window * 2
    }

    /// Record one completed turn, then trim the window
    pub async fn append(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        question: &str,
        answer: &str,
    ) -> Result<(), MemoryError> {
        let key = Self::key(user_id, document_id);
        let items = vec![
            serde_json::to_string(&ChatMessage::user(question))?,
            serde_json::to_string(&ChatMessage::assistant(answer))?,
        ];

        let length = self.store.list_append(&key, &items, self.ttl).await?;
        if length > self.capacity() {
            self.store.list_trim_last(&key, self.capacity()).await?;
        }

        debug!(key = %key, length, "recorded short-term turn");
        Ok(())
    }

    /// The most recent windowful of messages, oldest first
    pub async fn recent(
        &self,
        user_id: u64,
        document_id: Option<u64>,
    ) -> Result<Vec<ChatMessage>, MemoryError> {
        let key = Self::key(user_id, document_id);
        let raw = self.store.list_range(&key).await?;

        let skip = raw.len().saturating_sub(self.capacity());
        raw.iter()
            .skip(skip)
            .map(|item| serde_json::from_str(item).map_err(MemoryError::from))
            .collect()
    }

    /// Drop the whole window for a conversation
    pub async fn clear(&self, user_id: u64, document_id: Option<u64>) -> Result<(), MemoryError> {
        self.store.delete(&Self::key(user_id, document_id)).await?;
        Ok(())
    }
}
