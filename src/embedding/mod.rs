//! Embedding generation
//!
//! Turns passage and query text into vectors for similarity search.
//! Architecture:
//! - EmbeddingProvider trait for abstraction
//! - HttpEmbeddingProvider for OpenAI-compatible embedding APIs
//! - HashEmbedder as a deterministic degraded-mode fallback
//! - Embedder facade that picks between them per call

mod fallback;
mod provider;

pub use fallback::HashEmbedder;
pub use provider::{EmbeddingProvider, HttpEmbeddingProvider};

use crate::config::EmbeddingConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors from embedding generation
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding provider failed: {reason}")]
    Provider { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No embedding provider configured and hash fallback is disabled")]
    NotConfigured,
}

/// Embedding front end used by ingest, retrieval, and long-term memory.
///
/// Every vector in a collection must come from the same source, so one
/// `Embedder` is built at startup and shared. When the remote provider
/// fails and the hash fallback is enabled, the call degrades instead of
/// erroring; `degraded_calls` counts how often that happened.
pub struct Embedder {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    fallback: Option<HashEmbedder>,
    dimension: usize,
    degraded_calls: AtomicU64,
}

impl Embedder {
    pub fn new(
        provider: Option<Arc<dyn EmbeddingProvider>>,
        fallback: Option<HashEmbedder>,
        dimension: usize,
    ) -> Result<Self, EmbedError> {
        if provider.is_none() && fallback.is_none() {
            return Err(EmbedError::NotConfigured);
        }
        Ok(Self {
            provider,
            fallback,
            dimension,
            degraded_calls: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let provider: Option<Arc<dyn EmbeddingProvider>> = if config.api_url.is_empty() {
            None
        } else {
            Some(Arc::new(HttpEmbeddingProvider::from_config(config)))
        };
        let fallback = config
            .hash_fallback
            .then(|| HashEmbedder::new(config.dimension));

        Self::new(provider, fallback, config.dimension)
    }

    /// Embedding dimension every produced vector has
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// How many calls were served by the hash fallback after a provider failure
    pub fn degraded_calls(&self) -> u64 {
        self.degraded_calls.load(Ordering::Relaxed)
    }

    /// Embed one text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch.into_iter().next().ok_or(EmbedError::Provider {
            reason: "provider returned no embedding".to_string(),
        })
    }

    /// Embed many texts, preserving order
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(blank) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbedError::InvalidInput(format!(
                "text at position {} is blank",
                blank
            )));
        }

        match (&self.provider, &self.fallback) {
            (Some(provider), fallback) => match provider.embed_batch(texts).await {
                Ok(vectors) => Ok(vectors),
                Err(e) => {
                    if let Some(hash) = fallback {
                        self.degraded_calls.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "embedding provider failed, using hash fallback");
                        Ok(texts.iter().map(|t| hash.embed(t)).collect())
                    } else {
                        Err(e)
                    }
                }
            },
            (None, Some(hash)) => Ok(texts.iter().map(|t| hash.embed(t)).collect()),
            (None, None) => Err(EmbedError::NotConfigured),
        }
    }
}
