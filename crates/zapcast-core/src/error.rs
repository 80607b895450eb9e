//! Error types for the zapcast core library.

use thiserror::Error;

/// Result type alias using the zapcast core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for zapcast operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Channel descriptor parsing error
    #[error(transparent)]
    Channel(#[from] crate::channel::ChannelParseError),

    /// Frontend status document error
    #[error(transparent)]
    Status(#[from] crate::frontend::StatusParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
