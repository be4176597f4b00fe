//! Error types for pagelens-core

use thiserror::Error;

/// Main error type for the pagelens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// The event store query failed (connectivity, malformed query)
    #[error("data unavailable: {0}")]
    DataUnavailable(#[from] rusqlite::Error),

    /// Caller supplied an out-of-domain parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line in an event import
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result type alias for pagelens-core
pub type Result<T> = std::result::Result<T, Error>;
