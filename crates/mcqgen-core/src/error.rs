use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Index artifacts missing or unreadable; no context can be built.
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Rejected at the request boundary before any work starts.
    #[error("Allocation violation: {0}")]
    AllocationViolation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model unreachable: {0}")]
    ModelUnreachable(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Length mismatch: {vectors} vectors for {texts} texts")]
    LengthMismatch { vectors: usize, texts: usize },

    #[error("Tokenizer failed: {0}")]
    Tokenizer(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Corrupt index artifact: {0}")]
    CorruptIndex(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the per-topic state machine may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ModelUnreachable(_) | Error::MalformedResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
