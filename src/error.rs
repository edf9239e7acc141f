//! Error types for chatwire
//!
//! This module defines the error types used throughout the client,
//! using `thiserror` for ergonomic error handling.
//!
//! The stream reconciler never produces errors: stale or malformed events
//! are discarded there. Errors come from the collaborators around it
//! (configuration, REST calls, the realtime transport).

use thiserror::Error;

/// Main error type for chatwire operations
#[derive(Error, Debug)]
pub enum ChatwireError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Realtime transport failures (connect, send, stream read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A REST call returned a non-success status
    #[error("API error: status={status}, {message}")]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// Error text from the response body, if any
        message: String,
    },

    /// The requested chat does not exist (or is not visible to this user)
    #[error("Chat not found: {0}")]
    NotFound(String),

    /// An inbound event could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO errors (reading the config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors (config file)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for chatwire operations
///
/// Uses `anyhow::Error` so callers can attach context while the typed
/// [`ChatwireError`] stays recoverable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
