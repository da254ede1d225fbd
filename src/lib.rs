//! Strata - Hybrid retrieval with layered conversational memory
//!
//! A document question answering engine: documents are cleaned, chunked and
//! indexed into vector and keyword stores; questions run through a hybrid
//! retrieval pipeline (query analysis, expansion, concurrent fan-out, score
//! fusion, deduplication, optional reranking, relevance gating) while three
//! memory tiers carry the conversation across turns.

pub mod backend;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod prompt;
pub mod retrieval;
pub mod storage;

pub use engine::{Answer, ChatEngine};
pub use error::{Result, StrataError};
