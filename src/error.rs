//! Error types for the compression pipeline and the storage layer.
//!
//! - [`CompressError`]: raised by the codec and the pipeline
//! - [`StoreError`]: raised by key-value backends and the compressed wrapper
//! - [`ConfigError`]: raised while resolving configuration

use thiserror::Error;

/// Errors raised while encoding a value for storage or decoding it back.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Value cannot be represented as JSON (e.g. a reference cycle).
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored text is not valid JSON.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The compression engine is not available in this environment.
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// Empty record or unrecognized marker character.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Base64 decoding or compression engine failure.
    #[error("codec error: {0}")]
    Codec(String),
}

impl CompressError {
    /// Returns true if this error means a stored record could not be decoded.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            CompressError::InvalidFormat(_)
                | CompressError::Codec(_)
                | CompressError::Deserialization(_)
        )
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing the value would exceed the store's capacity.
    #[error("storage full: {0}")]
    StorageFull(String),

    /// Invalid key format.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Cannot connect to or communicate with storage backend.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Database error from SQLx.
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Value could not be compressed or decompressed.
    #[error(transparent)]
    Compression(#[from] CompressError),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
