use crate::config::Config;
use crate::error::{Result, StrataError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_rerank(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_memory(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StrataError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let c = &config.chunking;
        if c.min_size == 0 {
            errors.push(ValidationError::new(
                "chunking.min_size",
                "Minimum chunk size must be greater than 0",
            ));
        }
        if c.max_size <= c.min_size {
            errors.push(ValidationError::new(
                "chunking.max_size",
                format!(
                    "Maximum chunk size must exceed minimum ({} <= {})",
                    c.max_size, c.min_size
                ),
            ));
        }
        if c.overlap >= c.min_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap must be smaller than the minimum chunk size ({} >= {})",
                    c.overlap, c.min_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let e = &config.embedding;
        if e.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }
        if e.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
        if e.api_url.is_empty() && !e.hash_fallback {
            errors.push(ValidationError::new(
                "embedding.hash_fallback",
                "No embedding provider configured and hash fallback disabled",
            ));
        }
        if !e.api_url.is_empty() && e.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty when a provider is configured",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let r = &config.retrieval;
        if r.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
        if r.fanout_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.fanout_multiplier",
                "Fan-out multiplier must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&r.dedup_threshold) {
            errors.push(ValidationError::new(
                "retrieval.dedup_threshold",
                format!(
                    "Dedup threshold must be between 0.0 and 1.0, got {}",
                    r.dedup_threshold
                ),
            ));
        }
        if r.gate_max_distance <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.gate_max_distance",
                "Gate distance bound must be positive",
            ));
        }
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.rerank.enabled && config.rerank.api_url.is_empty() {
            errors.push(ValidationError::new(
                "rerank.api_url",
                "Reranker enabled but no API URL configured",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // If the LLM is enabled, the API key environment variable must be set
        if config.llm.enabled {
            if config.llm.api_url.is_empty() {
                errors.push(ValidationError::new(
                    "llm.api_url",
                    "LLM enabled but no API URL configured",
                ));
            }
            let env_var = &config.llm.api_key_env;
            if let Ok(key) = std::env::var(env_var) {
                if key.is_empty() {
                    errors.push(ValidationError::new(
                        "llm.api_key_env",
                        format!("Environment variable {} is empty", env_var),
                    ));
                }
            } else {
                errors.push(ValidationError::new(
                    "llm.api_key_env",
                    format!("Environment variable {} is not set", env_var),
                ));
            }
        }

        // Validate temperature range
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }
    }

    fn validate_memory(config: &Config, errors: &mut Vec<ValidationError>) {
        let m = &config.memory;
        if m.short_term_window == 0 {
            errors.push(ValidationError::new(
                "memory.short_term_window",
                "Short-term window must be greater than 0",
            ));
        }
        if m.long_term_enabled && m.long_term_top_k == 0 {
            errors.push(ValidationError::new(
                "memory.long_term_top_k",
                "Long-term top_k must be greater than 0 when enabled",
            ));
        }
    }
}
