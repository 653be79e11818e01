//! Error types for pg-explain-capture.
//!
//! Defines the main error enum used throughout the crate. Per-sample failures
//! are never propagated through this type; they are recorded on the sample.

use thiserror::Error;

/// Main error type for capture operations.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, permission denied, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors while reading samples or writing results.
    #[error("IO error: {0}")]
    Io(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an IO error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "IO Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the bare message, without the category prefix.
    ///
    /// This is the text stored on a sample when an explain attempt fails.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m)
            | Self::Query(m)
            | Self::Config(m)
            | Self::Io(m)
            | Self::Internal(m) => m,
        }
    }
}

/// Result type alias using CaptureError.
pub type Result<T> = std::result::Result<T, CaptureError>;
