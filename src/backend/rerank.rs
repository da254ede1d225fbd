//! Cross-encoder reranking capability (optional)

use crate::backend::llm::classify_reqwest;
use crate::backend::BackendError;
use crate::config::RerankConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Score assigned by the reranker to one candidate, by input index
#[derive(Debug, Clone, Copy)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}

/// Precision rescoring of (query, passage) pairs.
///
/// This capability is optional; when absent or failing, the retrieval
/// pipeline keeps its fused ordering.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Score each document against the query; omitted indices keep their
    /// fused score
    async fn rerank(&self, query: &str, documents: &[&str])
        -> Result<Vec<RerankScore>, BackendError>;
}

/// HTTP reranker speaking the common `/rerank` API shape
/// (`{model, query, documents}` in, `results[].{index, relevance_score}` out)
pub struct HttpReranker {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    pub fn from_config(config: &RerankConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait]
impl RerankProvider for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[&str],
    ) -> Result<Vec<RerankScore>, BackendError> {
        if query.is_empty() {
            return Err(BackendError::InvalidInput("empty query".to_string()));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
        };

        let url = format!("{}/rerank", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest("rerank", e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::unavailable(
                "rerank",
                format!("{}: {}", status, text),
            ));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| BackendError::unavailable("rerank", e))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| r.index < documents.len())
            .map(|r| RerankScore {
                index: r.index,
                score: r.relevance_score,
            })
            .collect())
    }
}
