use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding model failed to load: {0}")]
    ModelLoad(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid index descriptor {index}: {reason}")]
    InvalidDescriptor { index: String, reason: String },
    #[error("missing template {path}: {source}")]
    MissingTemplate {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unknown index: {0}")]
    UnknownIndex(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("malformed store reply: {0}")]
    MalformedReply(String),
    #[error("translation error: {0}")]
    Translation(String),
}

impl KnowledgeError {
    /// Fatal errors abort the operation that hit them. Everything else is a
    /// backend hiccup the retrieval layer may degrade around.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KnowledgeError::ModelLoad(_)
                | KnowledgeError::DimensionMismatch { .. }
                | KnowledgeError::InvalidDescriptor { .. }
                | KnowledgeError::MissingTemplate { .. }
                | KnowledgeError::Config(_)
        )
    }
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
