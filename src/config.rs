use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docstash pipeline.
///
/// Loaded once from the environment and passed into component constructors;
/// there is no process-wide configuration singleton so tests can build
/// components directly with fakes.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the vector index service.
    pub vector_store_url: String,
    /// Optional API key required by the vector index service.
    pub vector_store_api_key: Option<String>,
    /// Maximum records sent per upsert call to the vector index.
    pub upsert_batch_size: usize,
    /// Base URL of the embedding service.
    pub embedding_url: String,
    /// Optional API key for the embedding service.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Number of texts submitted per embedding call.
    pub embed_batch_size: usize,
    /// Attempt ceiling for a single embedding batch.
    pub embed_max_attempts: u32,
    /// Base delay in milliseconds for embedding batch retries.
    pub embed_retry_base_ms: u64,
    /// Per-request timeout in seconds for all remote collaborators.
    pub request_timeout_secs: u64,
    /// Maximum tokens per chunk window.
    pub chunk_max_tokens: usize,
    /// Maximum characters of chunk text stored in vector metadata.
    pub metadata_text_limit: usize,
    /// Maximum ingestion retries before a task is marked failed.
    pub ingest_max_retries: u32,
    /// Base delay in seconds between ingestion retries.
    pub ingest_retry_base_secs: u64,
    /// Cap in seconds on the ingestion retry delay.
    pub ingest_retry_cap_secs: u64,
    /// Base URL of the answer-generation service.
    pub answer_url: String,
    /// Optional API key for the answer-generation service.
    pub answer_api_key: Option<String>,
    /// Model identifier used for answer generation.
    pub answer_model: String,
    /// Default number of nearest chunks retrieved per question.
    pub top_k: usize,
    /// Character budget for the assembled answer context.
    pub answer_context_limit: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            vector_store_url: load_env("VECTOR_STORE_URL")?,
            vector_store_api_key: load_env_optional("VECTOR_STORE_API_KEY"),
            upsert_batch_size: load_env_or("UPSERT_BATCH_SIZE", 100)?,
            embedding_url: load_env("EMBEDDING_URL")?,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            embed_batch_size: load_env_or("EMBED_BATCH_SIZE", 64)?,
            embed_max_attempts: load_env_or("EMBED_MAX_ATTEMPTS", 3)?,
            embed_retry_base_ms: load_env_or("EMBED_RETRY_BASE_MS", 1_000)?,
            request_timeout_secs: load_env_or("REQUEST_TIMEOUT_SECS", 30)?,
            chunk_max_tokens: load_env_or("CHUNK_MAX_TOKENS", 400)?,
            metadata_text_limit: load_env_or("METADATA_TEXT_LIMIT", 2_000)?,
            ingest_max_retries: load_env_or("INGEST_MAX_RETRIES", 3)?,
            ingest_retry_base_secs: load_env_or("INGEST_RETRY_BASE_SECS", 60)?,
            ingest_retry_cap_secs: load_env_or("INGEST_RETRY_CAP_SECS", 300)?,
            answer_url: load_env("ANSWER_URL")?,
            answer_api_key: load_env_optional("ANSWER_API_KEY"),
            answer_model: load_env("ANSWER_MODEL")?,
            top_k: load_env_or("TOP_K", 5)?,
            answer_context_limit: load_env_or("ANSWER_CONTEXT_LIMIT", 6_000)?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}
