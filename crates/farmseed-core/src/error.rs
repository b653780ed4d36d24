//! Error types for farmseed-core

use thiserror::Error;

/// Result type alias using farmseed-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in farmseed-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Consumption requested more stock than is available
    #[error("Insufficient stock: {requested} requested, {available} available")]
    InsufficientStock { requested: f64, available: f64 },

    /// Record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Farm lookup failed during join
    #[error("Farm not found: {0}")]
    FarmNotFound(String),

    /// Join-farm password mismatch
    #[error("Incorrect farm password")]
    IncorrectPassword,

    /// Create-farm id collision
    #[error("A farm with id '{0}' already exists")]
    FarmAlreadyExists(String),

    /// Remote service returned a failure
    #[error("Remote error: {0}")]
    Remote(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Durable storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
