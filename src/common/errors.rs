//! Error types for the application
//!
//! Only I/O boundaries (configuration, snapshot storage, webhook transport)
//! produce a `CoreError`. Trading outcomes such as a rejected order or a
//! failed profit verdict are returned as plain values.

use thiserror::Error;

/// Result type alias using our CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Snapshot/threshold store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Webhook endpoint answered with a non-success status
    #[error("Webhook rejected alert: status {status}, body {body}")]
    Webhook { status: u16, body: String },

    /// Venue has no sandbox configuration
    #[error("Unknown venue: {0}")]
    UnknownVenue(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Configuration(err.to_string())
    }
}
