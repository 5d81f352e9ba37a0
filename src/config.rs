use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
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

/// Runtime configuration for the StudyMate server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Number of chunks embedded and committed per batch.
    pub embedding_batch_size: usize,
    /// Seconds allowed for one batch of embeddings before the batch fails.
    pub embedding_timeout_secs: u64,
    /// Soft character cap for one chunk of document text.
    pub chunk_size: usize,
    /// Cleaned sentences shorter than this are dropped as insignificant.
    pub min_sentence_length: usize,
    /// Per-page ceiling on emitted chunks.
    pub max_chunks_per_page: usize,
    /// Page ceiling for a single PDF.
    pub max_pages_per_pdf: usize,
    /// Byte ceiling for a single uploaded file.
    pub max_file_bytes: usize,
    /// Server-side clamp applied to every similarity search limit.
    pub search_max_results: usize,
    /// API key for the Groq chat-completion API.
    pub groq_api_key: String,
    /// Chat model identifier passed to Groq.
    pub groq_model: String,
    /// Chat-completions endpoint (overridable for testing).
    pub groq_api_url: String,
    /// API key for the Serper web search API.
    pub serper_api_key: String,
    /// Web search endpoint (overridable for testing).
    pub serper_api_url: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", "studymate"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION")?,
            embedding_batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 20)?,
            embedding_timeout_secs: parse_env_or("EMBEDDING_TIMEOUT_SECS", 60)?,
            chunk_size: parse_env_or("CHUNK_SIZE", 250)?,
            min_sentence_length: parse_env_or("MIN_SENTENCE_LENGTH", 10)?,
            max_chunks_per_page: parse_env_or("MAX_CHUNKS_PER_PAGE", 100)?,
            max_pages_per_pdf: parse_env_or("MAX_PAGES_PER_PDF", 300)?,
            max_file_bytes: parse_env_or("MAX_FILE_BYTES", 10 * 1024 * 1024)?,
            search_max_results: parse_env_or("SEARCH_MAX_RESULTS", 8)?,
            groq_api_key: load_env("GROQ_API_KEY")?,
            groq_model: load_env_or("GROQ_MODEL", "llama3-8b-8192"),
            groq_api_url: load_env_or(
                "GROQ_API_URL",
                "https://api.groq.com/openai/v1/chat/completions",
            ),
            serper_api_key: load_env("SERPER_API_KEY")?,
            serper_api_url: load_env_or("SERPER_API_URL", "https://google.serper.dev/search"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<T, ConfigError> {
    load_env(key)?
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        chunk_size = config.chunk_size,
        batch_size = config.embedding_batch_size,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
