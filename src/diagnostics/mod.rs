//! Diagnostics for backend failures.
//!
//! This module turns error chains and batch results into structured
//! diagnostic entries and emits them through `tracing`:
//! - Classification of benign "already exists" states
//! - Error chain walking (siblings and causes)
//! - Batch outcome reporting
//!
//! Every reporter also exposes the entries it would emit, so callers and
//! tests can inspect a report without a subscriber. Reporting never fails.

pub mod batch;
pub mod classifier;
pub mod walker;

pub use batch::BatchOutcomeReporter;
pub use classifier::{ErrorClassifier, IGNORABLE_SQL_STATES, IgnorableState, is_ignorable};
pub use walker::ErrorChainWalker;

use crate::error::DbError;
use crate::models::ErrorNode;
use tracing::{error, warn};

/// One line of a diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Error {
        message: String,
        sql_state: Option<String>,
        vendor_code: i32,
    },
    Cause {
        message: String,
    },
    Warning {
        message: String,
        sql_state: Option<String>,
        vendor_code: i32,
    },
    BatchFailure {
        message: String,
        sql_state: Option<String>,
        vendor_code: i32,
    },
    UpdateCount {
        index: usize,
        count: i64,
    },
}

impl Diagnostic {
    pub fn error(node: &ErrorNode) -> Self {
        Self::Error {
            message: node.message.clone(),
            sql_state: node.sql_state.clone(),
            vendor_code: node.vendor_code,
        }
    }

    pub fn cause(node: &ErrorNode) -> Self {
        Self::Cause {
            message: node.to_string(),
        }
    }

    pub fn warning(node: &ErrorNode) -> Self {
        Self::Warning {
            message: node.message.clone(),
            sql_state: node.sql_state.clone(),
            vendor_code: node.vendor_code,
        }
    }

    pub fn batch_failure(node: &ErrorNode) -> Self {
        Self::BatchFailure {
            message: node.message.clone(),
            sql_state: node.sql_state.clone(),
            vendor_code: node.vendor_code,
        }
    }

    /// The message text, or an empty string for update counts.
    pub fn message(&self) -> &str {
        match self {
            Self::Error { message, .. }
            | Self::Cause { message }
            | Self::Warning { message, .. }
            | Self::BatchFailure { message, .. } => message,
            Self::UpdateCount { .. } => "",
        }
    }

    /// Emit this entry as a tracing event.
    pub fn emit(&self) {
        match self {
            Self::Error {
                message,
                sql_state,
                vendor_code,
            } => error!(
                sql_state = sql_state.as_deref().unwrap_or("<undefined>"),
                vendor_code = *vendor_code,
                "{}",
                message
            ),
            Self::Cause { message } => error!(cause = %message, "Caused by"),
            Self::Warning {
                message,
                sql_state,
                vendor_code,
            } => warn!(
                sql_state = sql_state.as_deref().unwrap_or("<undefined>"),
                vendor_code = *vendor_code,
                "{}",
                message
            ),
            Self::BatchFailure {
                message,
                sql_state,
                vendor_code,
            } => error!(
                sql_state = sql_state.as_deref().unwrap_or("<undefined>"),
                vendor_code = *vendor_code,
                "Batch update failed: {}",
                message
            ),
            Self::UpdateCount { index, count } => {
                error!(statement = *index, update_count = *count, "Update count")
            }
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error {
                message,
                sql_state,
                vendor_code,
            }
            | Self::Warning {
                message,
                sql_state,
                vendor_code,
            }
            | Self::BatchFailure {
                message,
                sql_state,
                vendor_code,
            } => write!(
                f,
                "SQLState: {} | Error Code: {} | Message: {}",
                sql_state.as_deref().unwrap_or("<undefined>"),
                vendor_code,
                message
            ),
            Self::Cause { message } => write!(f, "Cause: {}", message),
            Self::UpdateCount { index, count } => write!(f, "Update count [{}]: {}", index, count),
        }
    }
}

/// The entries [`report_error`] emits for `err`.
///
/// Batch failures get the outcome report plus the error chain walk; other
/// errors with a backend chain get the walk; the rest become a single error
/// entry. Only the walk is filtered by the classifier, so an ignorable batch
/// failure still reports its update counts.
pub fn error_diagnostics(err: &DbError) -> Vec<Diagnostic> {
    let walker = ErrorChainWalker::default();
    match err {
        DbError::BatchPartialFailure { result } => {
            let mut out = BatchOutcomeReporter.diagnostics(result);
            if let Some(node) = &result.error {
                out.extend(walker.diagnostics(node));
            }
            out
        }
        DbError::BackendRejected { cause, .. } | DbError::Statement { cause } => {
            walker.diagnostics(cause)
        }
        _ => vec![Diagnostic::Error {
            message: err.to_string(),
            sql_state: None,
            vendor_code: 0,
        }],
    }
}

/// Route any `DbError` to the matching reporter.
pub fn report_error(err: &DbError) {
    for diagnostic in error_diagnostics(err) {
        diagnostic.emit();
    }
    if let DbError::BackendRejected {
        backend, suggestion, ..
    } = err
    {
        warn!(backend = %backend, suggestion = %suggestion, "Connection rejected");
    }
}
