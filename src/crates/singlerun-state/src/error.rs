//! Error types for state store operations

use thiserror::Error;

/// Result type for state store operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while reading or writing state records
#[derive(Error, Debug)]
pub enum StateError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed key or record
    #[error("Invalid state record: {0}")]
    Invalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
