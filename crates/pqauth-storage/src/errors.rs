//! Storage error types.

use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failure reported by an external store
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid column family
    #[error("Invalid column family: {0}")]
    InvalidColumnFamily(String),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
