//! Configuration management for strata
//!
//! Handles loading, validation, and management of the engine configuration:
//! retrieval thresholds, chunking bounds, backend endpoints and memory-tier
//! policies, with environment-variable overrides on top of the TOML file.

use crate::error::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Data directory with a leading `~` expanded to the home directory
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Ok(stripped) = self.data_dir.strip_prefix("~") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        self.data_dir.clone()
    }
}

/// Chunking bounds, in Unicode code points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub overlap: usize,
}

/// Embedding configuration
///
/// An empty `api_url` means no remote provider; `hash_fallback` keeps the
/// engine answering (with degraded, non-semantic vectors) when the provider
/// is absent or failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub api_key_env: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub hash_fallback: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key_env: "STRATA_EMBEDDING_API_KEY".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 768,
            batch_size: 16,
            timeout_ms: 10_000,
            hash_fallback: true,
        }
    }
}

/// Retrieval pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Final number of passages returned
    pub top_k: usize,
    /// Each fan-out branch requests top_k * fanout_multiplier hits
    pub fanout_multiplier: usize,
    /// Per-branch search timeout
    pub call_timeout_ms: u64,
    /// Jaccard similarity above which a candidate is a duplicate
    pub dedup_threshold: f64,
    /// Relevance gate: minimum top-candidate score
    pub gate_min_score: f32,
    /// Relevance gate: maximum raw vector distance for the lexical-overlap route
    pub gate_max_distance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            fanout_multiplier: 2,
            call_timeout_ms: 3_000,
            dedup_threshold: 0.8,
            gate_min_score: 0.3,
            gate_max_distance: 2.0,
        }
    }
}

/// Reranker configuration (optional capability)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub enabled: bool,
    pub api_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

/// Memory tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Turns kept verbatim in the sliding window
    pub short_term_window: usize,
    pub short_term_ttl_hours: u64,
    pub long_term_enabled: bool,
    pub long_term_top_k: usize,
    pub key_info_enabled: bool,
    pub key_info_ttl_days: u64,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_enabled: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StrataError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StrataError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| StrataError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        if let Some(overrides) = self.profiles.get(profile) {
            if let Some(url) = &overrides.embedding_api_url {
                self.embedding.api_url = url.clone();
            }
            if let Some(enabled) = overrides.llm_enabled {
                self.llm.enabled = enabled;
            }
            if let Some(enabled) = overrides.rerank_enabled {
                self.rerank.enabled = enabled;
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: STRATA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("STRATA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "EMBEDDING__API_URL" => {
                self.embedding.api_url = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__HASH_FALLBACK" => {
                self.embedding.hash_fallback = parse_bool(path, value)?;
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k =
                    value.parse().map_err(|_| StrataError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "RERANK__ENABLED" => {
                self.rerank.enabled = parse_bool(path, value)?;
            }
            "RERANK__API_URL" => {
                self.rerank.api_url = value.to_string();
            }
            "LLM__ENABLED" => {
                self.llm.enabled = parse_bool(path, value)?;
            }
            "LLM__API_URL" => {
                self.llm.api_url = value.to_string();
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| StrataError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("strata").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| StrataError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".strata"))
    }
}

fn parse_bool(path: &str, value: &str) -> Result<bool> {
    value.parse().map_err(|_| StrataError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as boolean", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.strata"),
            },
            chunking: ChunkingConfig {
                min_size: 200,
                max_size: 500,
                overlap: 50,
            },
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            rerank: RerankConfig {
                enabled: false,
                api_url: String::new(),
                model: "bge-reranker-base".to_string(),
                timeout_ms: 5_000,
            },
            llm: LlmConfig {
                enabled: false,
                api_url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.1,
                max_tokens: 1024,
                timeout_ms: 60_000,
            },
            memory: MemoryConfig {
                short_term_window: 5,
                short_term_ttl_hours: 24,
                long_term_enabled: true,
                long_term_top_k: 3,
                key_info_enabled: true,
                key_info_ttl_days: 30,
            },
            profiles: HashMap::new(),
        }
    }
}
