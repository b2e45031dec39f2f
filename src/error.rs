//! Error types for the write-deferral cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the write-deferral cache
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete type registration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache provider read/write failure, propagated verbatim
    #[error("Cache provider error: {0}")]
    Provider(String),

    /// Durable store fetch/persist failure, propagated verbatim
    #[error("Durable store error: {0}")]
    Store(String),

    /// Cache-only assignment to an attribute outside the cached set
    #[error("Attribute '{field}' is not in the cached set")]
    NotCached { field: String },

    /// Cache entry encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
