//! Error types for db-resolver.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Backend failures carry the full `ErrorNode` chain the backend returned so the
//! diagnostics layer can walk it.

use crate::diagnostics::classifier;
use crate::models::{BackendKind, BatchResult, ErrorNode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// No resolution strategy exists for the named backend.
    #[error("Unsupported backend: {backend}")]
    UnsupportedBackend { backend: String },

    #[error("Connection to {backend} rejected: {cause}")]
    BackendRejected {
        backend: BackendKind,
        #[source]
        cause: ErrorNode,
        suggestion: String,
    },

    #[error(
        "Batch stopped after {} statement(s): {}",
        .result.succeeded(),
        .result.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown error")
    )]
    BatchPartialFailure { result: BatchResult },

    #[error("Statement failed: {cause}")]
    Statement {
        #[source]
        cause: ErrorNode,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Connection is closed")]
    ConnectionClosed,
}

impl DbError {
    /// Create an unsupported backend error.
    pub fn unsupported_backend(backend: impl Into<String>) -> Self {
        Self::UnsupportedBackend {
            backend: backend.into(),
        }
    }

    /// Create a backend rejection error, deriving a suggestion from the cause.
    pub fn backend_rejected(backend: BackendKind, cause: ErrorNode) -> Self {
        let suggestion = connection_suggestion(backend, &cause);
        Self::BackendRejected {
            backend,
            cause,
            suggestion,
        }
    }

    /// Create a single-statement failure.
    pub fn statement(cause: ErrorNode) -> Self {
        Self::Statement { cause }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::BackendRejected { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The backend error chain attached to this error, if any.
    pub fn error_node(&self) -> Option<&ErrorNode> {
        match self {
            Self::BackendRejected { cause, .. } | Self::Statement { cause } => Some(cause),
            Self::BatchPartialFailure { result } => result.error.as_ref(),
            _ => None,
        }
    }

    /// Check if the backend classified this failure as benign.
    ///
    /// An ignorable error is still an error; only its diagnostics are suppressed.
    pub fn is_ignorable(&self) -> bool {
        self.error_node()
            .is_some_and(|node| classifier::is_ignorable(node.sql_state.as_deref()))
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(backend: BackendKind, cause: &ErrorNode) -> String {
    let error_str = cause
        .siblings()
        .chain(cause.causes())
        .map(|node| node.message.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", backend);
    }

    if error_str.contains("access denied")
        || error_str.contains("authentication")
        || error_str.contains("password")
    {
        return "Verify the user name and password".to_string();
    }

    if error_str.contains("unknown database") || error_str.contains("does not exist") {
        return "Check that the database name exists, or create it first".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    if error_str.contains("no suitable driver") {
        return "Check the backend identifier and connection URL scheme".to_string();
    }

    match backend {
        BackendKind::Embedded => {
            "Verify the database path is writable: sqlite:path/to/db.sqlite".to_string()
        }
        _ => format!(
            "Verify host and port: {}://host:{}/",
            backend.url_scheme(),
            backend.default_port().unwrap_or(3306)
        ),
    }
}
