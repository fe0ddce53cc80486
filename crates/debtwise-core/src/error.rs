//! Error type shared by every DebtWise crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DebtWiseError>;

#[derive(Debug, Error)]
pub enum DebtWiseError {
    /// The embedding capability failed or returned malformed output.
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The chunk store could not be read or written.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Duplicate chunk id: {0}")]
    DuplicateId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A source document could not be read or its text extracted.
    #[error("Document error: {0}")]
    Document(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DebtWiseError {
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// True for failures of the embedding capability, including dimensionality.
    pub fn is_embedding_error(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::DimensionMismatch { .. })
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Whether a caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::StoreUnavailable(_)
                | Self::Http(_)
                | Self::Embedding(_)
                | Self::DuplicateId(_)
        )
    }
}
