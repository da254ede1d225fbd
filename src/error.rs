use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the strata engine
#[derive(Error, Debug)]
pub enum StrataError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A required capability has no provider and no fallback
    #[error("Capability not configured: {capability}: {message}")]
    CapabilityNotConfigured {
        capability: &'static str,
        message: String,
    },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document ingestion errors
    #[error(transparent)]
    Ingest(#[from] crate::ingest::IngestError),

    /// Retrieval pipeline errors
    #[error(transparent)]
    Search(#[from] crate::retrieval::SearchError),

    /// Memory tier errors
    #[error(transparent)]
    Memory(#[from] crate::memory::MemoryError),

    /// Embedding errors
    #[error(transparent)]
    Embed(#[from] crate::embedding::EmbedError),

    /// Chat engine errors
    #[error(transparent)]
    Engine(#[from] crate::engine::EngineError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for strata operations
pub type Result<T> = std::result::Result<T, StrataError>;
