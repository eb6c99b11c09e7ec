//! Error types for triagedeck-core

use thiserror::Error;

/// Main error type for the triagedeck-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed search/filter input that could not be recovered by clamping
    #[error("validation error: {0}")]
    Validation(String),

    /// Processing was requested for issues that already have a run in flight
    #[error("processing already in flight for: {}", issue_ids.join(", "))]
    Conflict { issue_ids: Vec<String> },

    /// Provider payload could not be normalized into an Issue
    #[error("normalize error in {provider} payload: {message}")]
    Normalize { provider: String, message: String },

    /// Network/process failure feeding an event stream
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result type alias for triagedeck-core
pub type Result<T> = std::result::Result<T, Error>;
