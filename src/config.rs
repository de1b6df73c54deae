use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AnimeSearchError, Result};

/// Embedding model type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModelType {
    /// all-MiniLM-L6-v2 (English, 384 dim, fast)
    #[default]
    Minilm,
    /// multilingual-e5-small (100 languages, 384 dim, requires prefix)
    E5Multilingual,
}

impl ModelType {
    /// HuggingFace repository id for hf-hub resolution
    pub fn hf_repo_id(&self) -> &'static str {
        match self {
            ModelType::Minilm => "sentence-transformers/all-MiniLM-L6-v2",
            ModelType::E5Multilingual => "intfloat/multilingual-e5-small",
        }
    }

    /// Model display name for messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Minilm => "all-MiniLM-L6-v2",
            ModelType::E5Multilingual => "multilingual-e5-small",
        }
    }

    /// Whether this model requires query/passage prefix
    pub fn requires_prefix(&self) -> bool {
        match self {
            ModelType::Minilm => false,
            ModelType::E5Multilingual => true,
        }
    }

    /// Parse the `MODEL_NAME` config value
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all-MiniLM-L6-v2" | "minilm" => Some(ModelType::Minilm),
            "multilingual-e5-small" | "e5-multilingual" => Some(ModelType::E5Multilingual),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Embedding model used for queries (must match the one used offline)
    pub model_type: ModelType,

    /// Precomputed (catalog, embedding matrix) file
    pub embeddings_file: PathBuf,

    /// HTTP bind host
    pub host: String,

    /// HTTP bind port
    pub port: u16,

    /// Force debug-level logging
    pub debug: bool,

    /// Append-mode log file, written alongside stdout
    pub log_file: PathBuf,

    /// Log level when `RUST_LOG` is not set
    pub log_level: String,

    /// Maximum accepted query length, in characters
    pub max_query_length: usize,

    /// Page size when the client sends no `limit`
    pub default_limit: usize,

    /// Upper clamp for the `limit` parameter
    pub max_limit: usize,

    /// Cache query vectors between requests
    pub enable_query_cache: bool,

    /// Maximum number of cached query vectors
    pub max_cache_size: usize,

    /// Batch size for offline embedding generation
    pub embed_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_type: ModelType::default(),
            embeddings_file: PathBuf::from("anime_embeddings.bin"),
            host: "127.0.0.1".to_string(),
            port: 5000,
            debug: false,
            log_file: PathBuf::from("anime_search.log"),
            log_level: "info".to_string(),
            max_query_length: 500,
            default_limit: 5,
            max_limit: 50,
            enable_query_cache: true,
            max_cache_size: 100,
            embed_batch_size: 32,
        }
    }
}

impl Config {
    /// Build the runtime configuration from environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("MODEL_NAME") {
            config.model_type = ModelType::from_name(&name)
                .ok_or_else(|| AnimeSearchError::Config(format!("Unknown model name: {name}")))?;
        }
        if let Ok(path) = env::var("EMBEDDINGS_FILE") {
            config.embeddings_file = PathBuf::from(path);
        }
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(path) = env::var("LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        config.port = env_parse("PORT", config.port)?;
        config.debug = env_parse("DEBUG", config.debug)?;
        config.max_query_length = env_parse("MAX_QUERY_LENGTH", config.max_query_length)?;
        config.default_limit = env_parse("DEFAULT_LIMIT", config.default_limit)?;
        config.max_limit = env_parse("MAX_LIMIT", config.max_limit)?;
        config.enable_query_cache = env_parse("ENABLE_QUERY_CACHE", config.enable_query_cache)?;
        config.max_cache_size = env_parse("MAX_CACHE_SIZE", config.max_cache_size)?;
        config.embed_batch_size = env_parse("EMBED_BATCH_SIZE", config.embed_batch_size)?;

        Ok(config)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AnimeSearchError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
