use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnimeSearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embeddings file error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Model loading error: {0}")]
    ModelLoad(String),

    #[error("Model download error: {0}")]
    ModelDownload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidQuery(String),
}

pub type Result<T> = std::result::Result<T, AnimeSearchError>;
