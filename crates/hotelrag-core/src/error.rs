//! Error types for HotelRAG

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the retrieval pipeline.
///
/// Each variant is scoped to a single orchestration call; nothing here is
/// fatal to the host process.
#[derive(Error, Debug)]
pub enum Error {
    /// The embedding provider could not embed the input. Never retried.
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    /// The input was longer than the model accepts. Drives the truncation ladder.
    #[error("Input exceeds model context length: {0}")]
    ContextLengthExceeded(String),

    /// Transport or backend failure of the similarity store. Retryable.
    #[error("Similarity store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected the query shape. Fails fast.
    #[error("Invalid store query: {0}")]
    InvalidQuery(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Filter extraction failed: {0}")]
    FilterExtraction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::Timeout(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
