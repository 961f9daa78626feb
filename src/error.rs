//! Error types for fallible construction and persistence.
//!
//! Request execution never surfaces these: network, HTTP and rate-limit
//! failures travel inside [`crate::http::ApiResponse`] instead.

use thiserror::Error;

/// Errors raised while building a client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured base URL cannot be parsed.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The underlying HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// A persisted cache could not be loaded.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from token or cache persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for client construction.
pub type ClientResult<T> = Result<T, ClientError>;
