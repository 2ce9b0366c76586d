//! Error types for Mneme operations

/// Result type for Mneme operations
pub type Result<T> = std::result::Result<T, MnemeError>;

/// Error types for the memory engine
#[derive(Debug, thiserror::Error)]
pub enum MnemeError {
    /// Embedding provider failed to produce a vector
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding provider returned a vector of the wrong length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the deployment is configured for
        expected: usize,
        /// Dimension actually returned
        actual: usize,
    },

    /// Writing a new entry to the vector index failed
    #[error("Index write failed for {id}: {message}")]
    IndexWrite {
        /// Memory ID that could not be written
        id: String,
        /// Underlying failure
        message: String,
    },

    /// Vector index read or query failed
    #[error("Index error: {0}")]
    Index(String),

    /// Memory not found
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Caller supplied invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MnemeError {
    /// Whether the caller may retry the failed operation unchanged.
    ///
    /// Only upstream embedding failures qualify; nothing was mutated when they occur.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MnemeError::Embedding(_))
    }
}

impl From<String> for MnemeError {
    fn from(s: String) -> Self {
        MnemeError::Other(s)
    }
}

impl From<&str> for MnemeError {
    fn from(s: &str) -> Self {
        MnemeError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for MnemeError {
    fn from(err: anyhow::Error) -> Self {
        MnemeError::Other(err.to_string())
    }
}
