//! Engine facade
//!
//! Wires the retrieval pipeline, the memory tiers and generation into one
//! `ask` entry point, and owns the backend wiring: local SQLite stores for
//! vectors, keywords and memory, plus optional HTTP providers for
//! reranking and generation. Documents and conversations live in separate
//! vector collections.

use crate::backend::{
    BackendError, ChatModel, HttpChatModel, HttpReranker, KeywordSearch, LocalKeywordStore,
    LocalVectorStore, MemoryStore, RerankProvider, VectorSearch,
};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{Result, StrataError};
use crate::ingest::{Chunker, IngestReport, Ingestor};
use crate::memory::LayeredContextManager;
use crate::prompt::{general_request, grounded_request};
use crate::retrieval::{HybridSearcher, RetrievalCandidate, SearchOutcome};
use crate::storage::{DocumentRecord, StorageManager, StorageStats};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised by the engine itself
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller passed unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The configured language model failed to produce an answer
    #[error("answer generation failed: {0}")]
    Generation(#[from] BackendError),
}

/// The engine's response to one question
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Chunk ids of the passages the answer is grounded in, ranked
    pub sources: Vec<String>,
    /// Whether the answer draws on document passages or general knowledge
    pub grounded: bool,
}

/// Document question answering over local storage and layered memory
pub struct ChatEngine {
    config: Config,
    storage: StorageManager,
    searcher: HybridSearcher,
    ingestor: Ingestor,
    memory: LayeredContextManager,
    chat: Option<Arc<dyn ChatModel>>,
}

impl ChatEngine {
    /// Build the full engine from configuration. Fails when a required
    /// capability has neither a provider nor a fallback.
    pub fn new(config: Config) -> Result<Self> {
        let storage = StorageManager::new(config.storage.resolved_data_dir())?;
        let db = Arc::clone(&storage.database);

        let embedder = Arc::new(Embedder::from_config(&config.embedding).map_err(|e| {
            StrataError::CapabilityNotConfigured {
                capability: "embedding",
                message: e.to_string(),
            }
        })?);

        let document_vectors: Arc<dyn VectorSearch> =
            Arc::new(LocalVectorStore::new(Arc::clone(&db), "documents"));
        let conversation_vectors: Arc<dyn VectorSearch> =
            Arc::new(LocalVectorStore::new(Arc::clone(&db), "conversations"));
        let keywords: Arc<dyn KeywordSearch> = Arc::new(LocalKeywordStore::new(Arc::clone(&db)));
        let memory_store: Arc<dyn MemoryStore> =
            Arc::new(crate::storage::SqliteMemoryStore::new(Arc::clone(&db)));

        let reranker: Option<Arc<dyn RerankProvider>> = config
            .rerank
            .enabled
            .then(|| Arc::new(HttpReranker::from_config(&config.rerank)) as Arc<dyn RerankProvider>);
        let chat: Option<Arc<dyn ChatModel>> = config
            .llm
            .enabled
            .then(|| Arc::new(HttpChatModel::from_config(&config.llm)) as Arc<dyn ChatModel>);

        let searcher = HybridSearcher::new(
            Arc::clone(&embedder),
            Arc::clone(&document_vectors),
            Arc::clone(&keywords),
            reranker,
            config.retrieval.clone(),
        );
        let ingestor = Ingestor::new(
            Arc::clone(&db),
            Chunker::from_config(&config.chunking),
            Arc::clone(&embedder),
            document_vectors,
            keywords,
            config.embedding.batch_size,
        );
        let memory = LayeredContextManager::new(
            memory_store,
            embedder,
            conversation_vectors,
            &config.memory,
        );

        info!(
            data_dir = %storage.base_path().display(),
            llm = config.llm.enabled,
            rerank = config.rerank.enabled,
            "engine ready"
        );

        Ok(Self {
            config,
            storage,
            searcher,
            ingestor,
            memory,
            chat,
        })
    }

    /// Answer one question for a conversation, grounding it in document
    /// passages when the retrieval gate finds them relevant.
    pub async fn ask(
        &self,
        user_id: u64,
        document_id: Option<u64>,
        question: &str,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::InvalidInput("question cannot be empty".to_string()).into());
        }

        // Step 1: conversational context across the memory tiers
        let context = self.memory.build_context(user_id, document_id, question).await;

        // Step 2: gated hybrid retrieval
        let outcome = self
            .searcher
            .search_gated(question, document_id, self.config.retrieval.top_k)
            .await?;

        // Step 3: grounded or general-knowledge prompt
        let grounded = outcome.relevant;
        let (request, sources) = if grounded {
            let sources = outcome
                .candidates
                .iter()
                .map(|c| c.chunk_id.clone())
                .collect();
            (
                grounded_request(question, &outcome.candidates, &context),
                sources,
            )
        } else {
            (general_request(question, &context), Vec::new())
        };

        // Step 4: generate the answer
        let text = match &self.chat {
            Some(model) => model
                .generate(&request.system_prompt, &request.messages)
                .await
                .map_err(EngineError::Generation)?,
            None => offline_answer(&outcome.candidates, grounded),
        };

        // Step 5: record the completed turn in every memory tier
        self.memory
            .record_turn(user_id, document_id, question, &text)
            .await;

        info!(user_id, grounded, sources = sources.len(), "answered question");
        Ok(Answer {
            text,
            sources,
            grounded,
        })
    }

    /// Run the retrieval pipeline without generating an answer
    pub async fn search(
        &self,
        query: &str,
        document_filter: Option<u64>,
        top_k: usize,
    ) -> Result<SearchOutcome> {
        Ok(self.searcher.search_gated(query, document_filter, top_k).await?)
    }

    /// Ingest a document into the index
    pub async fn ingest(&self, name: &str, text: &str) -> Result<IngestReport> {
        self.ingestor.ingest(name, text).await
    }

    /// Remove a document and everything indexed for it
    pub async fn remove_document(&self, document_id: u64) -> Result<bool> {
        self.ingestor.remove(document_id).await
    }

    /// Drop the short-term window and key-info record for a conversation
    pub async fn forget(&self, user_id: u64, document_id: Option<u64>) -> Result<()> {
        self.memory.clear(user_id, document_id).await?;
        Ok(())
    }

    /// All registered documents, newest first
    pub fn documents(&self) -> Result<Vec<DocumentRecord>> {
        self.storage.database.list_documents()
    }

    /// Storage statistics for the data directory
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &LayeredContextManager {
        &self.memory
    }
}

/// Answer text used when no language model is configured: grounded answers
/// surface the passages themselves, general ones admit there is nothing to
/// stand on.
fn offline_answer(candidates: &[RetrievalCandidate], grounded: bool) -> String {
    if !grounded {
        return "No language model is configured and no relevant document content was found. \
                Configure an LLM under [llm] in the config to enable general-knowledge answers."
            .to_string();
    }

    let mut text =
        String::from("No language model is configured; the most relevant passages are:\n");
    for (index, candidate) in candidates.iter().enumerate() {
        text.push_str(&format!("\n[{}] {}\n", index + 1, candidate.content));
    }
    text
}
