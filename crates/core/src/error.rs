//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("checksum manifest parse error: {0}")]
    ChecksumParse(String),

    #[error("checksum not found for file: {0}")]
    ChecksumNotFound(String),

    #[error("invalid archive file name: {0}")]
    InvalidArchiveName(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
