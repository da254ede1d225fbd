//! Layered conversational memory
//!
//! Three tiers of state per (user, document) conversation:
//! - [`ShortTermMemory`]: the last few turns verbatim, in a sliding window
//! - [`LongTermMemory`]: older turns recalled by semantic similarity
//! - [`KeyInfoExtractor`]: structured facts distilled from the dialogue
//!
//! [`LayeredContextManager`] owns all three. Retrieval code never touches
//! memory state directly; it goes through `build_context` / `record_turn`,
//! and concurrent turns for the same conversation are serialized by a
//! key-scoped lock so a slow turn cannot lose another turn's update.

use crate::backend::{BackendError, ChatMessage, MemoryStore, VectorSearch};
use crate::config::MemoryConfig;
use crate::embedding::{EmbedError, Embedder};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub mod key_info;
pub mod long_term;
pub mod short_term;

pub use key_info::{classify_intent, extract_fields, KeyInfoExtractor};
pub use long_term::{HistoricalTurn, LongTermMemory};
pub use short_term::ShortTermMemory;

/// Errors from the memory tiers
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The backing memory store or vector collection failed
    #[error(transparent)]
    Store(#[from] BackendError),

    /// A stored message or record could not be encoded or decoded
    #[error("memory record codec failure: {0}")]
    Codec(#[from] serde_json::Error),

    /// Embedding the conversation text failed
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Conversation scope part of memory keys and ids
pub(crate) fn scope_label(document_id: Option<u64>) -> String {
    match document_id {
        Some(id) => id.to_string(),
        None => "general".to_string(),
    }
}

/// Everything the memory tiers know about one conversation, gathered for a
/// single turn
#[derive(Debug, Clone, Default)]
pub struct LayeredContext {
    pub short_term: Vec<ChatMessage>,
    pub long_term: Vec<HistoricalTurn>,
    pub key_info: BTreeMap<String, String>,
}

impl LayeredContext {
    /// Flatten the tiers into the message sequence handed to generation.
    ///
    /// Fixed order: key-info system message, long-term reference system
    /// message, short-term turns verbatim oldest first, then the current
    /// question. Empty tiers are skipped.
    pub fn to_messages(&self, current_question: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if !self.key_info.is_empty() {
            messages.push(ChatMessage::system(render_key_info(&self.key_info)));
        }
        if !self.long_term.is_empty() {
            messages.push(ChatMessage::system(render_history(&self.long_term)));
        }
        messages.extend(self.short_term.iter().cloned());
        messages.push(ChatMessage::user(current_question));
        messages
    }
}

fn render_key_info(record: &BTreeMap<String, String>) -> String {
    let mut text = String::from("Key facts established in this conversation:\n");
    for (field, value) in record {
        text.push_str(&format!("- {field}: {value}\n"));
    }
    text.push_str("\nKeep your answers consistent with these facts.");
    text
}

fn render_history(turns: &[HistoricalTurn]) -> String {
    let mut text = String::from("Related exchanges from earlier conversations, for reference:\n");
    for (index, turn) in turns.iter().enumerate() {
        text.push_str(&format!(
            "\nExchange {}:\nQ: {}\nA: {}\n",
            index + 1,
            turn.question,
            turn.answer
        ));
    }
    text
}

/// Facade over the three memory tiers, keyed by (user, document)
pub struct LayeredContextManager {
    short_term: ShortTermMemory,
    long_term: Option<LongTermMemory>,
    key_info: Option<KeyInfoExtractor>,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LayeredContextManager {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<Embedder>,
        conversation_vectors: Arc<dyn VectorSearch>,
        config: &MemoryConfig,
    ) -> Self {
        let short_term = ShortTermMemory::new(
            Arc::clone(&store),
            config.short_term_window,
            Duration::from_secs(config.short_term_ttl_hours * 3600),
        );
        let long_term = config
            .long_term_enabled
            .then(|| LongTermMemory::new(embedder, conversation_vectors, config.long_term_top_k));
        let key_info = config.key_info_enabled.then(|| {
            KeyInfoExtractor::new(store, Duration::from_secs(config.key_info_ttl_days * 86_400))
        });

        Self {
            short_term,
            long_term,
            key_info,
            turn_locks: DashMap::new(),
        }
    }

    fn turn_lock(&self, user_id: u64, document_id: Option<u64>) -> Arc<Mutex<()>> {
        let key = format!("{}:{}", user_id, scope_label(document_id));
        let entry = self.turn_locks.entry(key).or_default();
        Arc::clone(entry.value())
    }

    /// Gather all tiers for one turn. A failing tier degrades to empty
    /// instead of failing the turn.
    pub async fn build_context(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        question: &str,
    ) -> LayeredContext {
        let short_term = match self.short_term.recent(user_id, document_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "short-term memory unavailable, skipping tier");
                Vec::new()
            }
        };

        let long_term = match &self.long_term {
            Some(tier) => match tier.retrieve(user_id, document_id, question).await {
                Ok(turns) => turns,
                Err(e) => {
                    warn!(error = %e, "long-term memory unavailable, skipping tier");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let key_info = match &self.key_info {
            Some(tier) => match tier.current(user_id, document_id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "key-info record unavailable, skipping tier");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };

        debug!(
            user_id,
            scope = %scope_label(document_id),
            short_term = short_term.len(),
            long_term = long_term.len(),
            key_info = key_info.len(),
            "built layered context"
        );

        LayeredContext {
            short_term,
            long_term,
            key_info,
        }
    }

    /// Record one completed turn in every tier. Tier failures are logged
    /// and swallowed; the answer has already been produced at this point.
    pub async fn record_turn(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        question: &str,
        answer: &str,
    ) {
        let lock = self.turn_lock(user_id, document_id);
        let _guard = lock.lock().await;

        if let Err(e) = self
            .short_term
            .append(user_id, document_id, question, answer)
            .await
        {
            warn!(error = %e, "failed to record turn in short-term memory");
        }

        if let Some(tier) = &self.long_term {
            if let Err(e) = tier.save(user_id, document_id, question, answer).await {
                warn!(error = %e, "failed to record turn in long-term memory");
            }
        }

        if let Some(tier) = &self.key_info {
            if let Err(e) = tier
                .extract_and_store(user_id, document_id, question, answer)
                .await
            {
                warn!(error = %e, "failed to update key-info record");
            }
        }
    }

    /// Drop the short-term window and key-info record for a conversation.
    /// Long-term vectors are retained.
    pub async fn clear(&self, user_id: u64, document_id: Option<u64>) -> Result<(), MemoryError> {
        let lock = self.turn_lock(user_id, document_id);
        let _guard = lock.lock().await;

        self.short_term.clear(user_id, document_id).await?;
        if let Some(tier) = &self.key_info {
            tier.clear(user_id, document_id).await?;
        }
        Ok(())
    }
}
