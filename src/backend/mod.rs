//! Consumed backend capabilities
//!
//! The engine never implements a vector index, keyword index, reranker, LLM
//! or durable key-value store itself; it consumes them through the traits in
//! this module. Reference implementations are provided for local use: the
//! SQLite brute-force stores in [`local`], the DashMap-backed
//! [`InMemoryStore`], and HTTP providers speaking OpenAI-style APIs.
//!
//! Every capability call that fails or times out maps to
//! [`BackendError::Unavailable`] / [`BackendError::Timeout`]; callers at the
//! retrieval fan-out boundary degrade those to empty contributions instead
//! of failing the request.

use thiserror::Error;

pub mod keyword;
pub mod llm;
pub mod local;
pub mod memory_store;
pub mod rerank;
pub mod vector;

pub use keyword::{KeywordEntry, KeywordHit, KeywordSearch};
pub use llm::{ChatMessage, ChatModel, HttpChatModel, Role};
pub use local::{LocalKeywordStore, LocalVectorStore};
pub use memory_store::{InMemoryStore, MemoryStore};
pub use rerank::{HttpReranker, RerankProvider, RerankScore};
pub use vector::{VectorEntry, VectorHit, VectorSearch};

/// Errors surfaced by backend capabilities
#[derive(Error, Debug)]
pub enum BackendError {
    /// Caller passed unusable input (empty query, wrong dimension, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backing service failed; callers degrade rather than abort
    #[error("{capability} backend unavailable: {reason}")]
    Unavailable {
        capability: &'static str,
        reason: String,
    },

    /// The call exceeded its configured deadline
    #[error("{capability} call timed out after {millis}ms")]
    Timeout { capability: &'static str, millis: u64 },
}

impl BackendError {
    pub fn unavailable(capability: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            capability,
            reason: reason.to_string(),
        }
    }
}
