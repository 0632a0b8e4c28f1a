//! Backend error chains.
//!
//! Backends report failures as a list of errors (one per failed statement or
//! warning), each of which may wrap a lower-level cause. `ErrorNode` keeps
//! both links explicit: `next` points to the following sibling in the list and
//! `cause` to the nested error that produced this one.

use sqlx::error::DatabaseError;
use std::error::Error as StdError;

/// Hard cap on the number of nodes visited along any single chain.
pub const MAX_CHAIN_DEPTH: usize = 256;

/// One error (or warning) reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorNode {
    pub message: String,
    /// Five-character SQLSTATE, when the backend reported one.
    pub sql_state: Option<String>,
    /// Vendor-specific error number (0 when unknown).
    pub vendor_code: i32,
    pub cause: Option<Box<ErrorNode>>,
    pub next: Option<Box<ErrorNode>>,
}

impl ErrorNode {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn with_vendor_code(mut self, vendor_code: i32) -> Self {
        self.vendor_code = vendor_code;
        self
    }

    pub fn with_cause(mut self, cause: ErrorNode) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_next(mut self, next: ErrorNode) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    /// Append `node` after the last sibling of this chain.
    pub fn push_next(&mut self, node: ErrorNode) {
        let mut slot = &mut self.next;
        let mut depth = 0;
        while let Some(existing) = slot {
            depth += 1;
            if depth >= MAX_CHAIN_DEPTH {
                tracing::warn!(
                    max_depth = MAX_CHAIN_DEPTH,
                    "Error chain too long, dropping appended node"
                );
                return;
            }
            slot = &mut existing.next;
        }
        *slot = Some(Box::new(node));
    }

    /// This node followed by every `next` sibling.
    pub fn siblings(&self) -> impl Iterator<Item = &ErrorNode> {
        std::iter::successors(Some(self), |node| node.next.as_deref()).take(MAX_CHAIN_DEPTH)
    }

    /// The nested causes of this node, innermost last. Does not include `self`.
    pub fn causes(&self) -> impl Iterator<Item = &ErrorNode> {
        std::iter::successors(self.cause.as_deref(), |node| node.cause.as_deref())
            .take(MAX_CHAIN_DEPTH)
    }

    /// Build a cause-only chain from any `std::error::Error` and its sources.
    pub fn from_std(err: &(dyn StdError + 'static)) -> Self {
        let mut messages: Vec<String> = std::iter::successors(Some(err), |e| (*e).source())
            .take(MAX_CHAIN_DEPTH)
            .map(ToString::to_string)
            .collect();

        let mut node = ErrorNode::new(messages.pop().unwrap_or_default());
        while let Some(message) = messages.pop() {
            node = ErrorNode::new(message).with_cause(node);
        }
        node
    }
}

impl std::fmt::Display for ErrorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "{} (SQLSTATE: {})", self.message, state),
            None => f.write_str(&self.message),
        }
    }
}

impl StdError for ErrorNode {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}

/// Convert sqlx errors to an error chain.
///
/// Database errors keep their SQLSTATE and vendor number; every other variant
/// becomes a message-only node. The error's `source()` chain becomes `cause`.
impl From<sqlx::Error> for ErrorNode {
    fn from(err: sqlx::Error) -> Self {
        let cause = match &err {
            // The database error itself is the source; walk past it.
            sqlx::Error::Database(db_err) => db_err.source().map(ErrorNode::from_std),
            _ => err.source().map(ErrorNode::from_std),
        };

        let node = match &err {
            sqlx::Error::Database(db_err) => {
                let mut node = ErrorNode::new(db_err.message())
                    .with_vendor_code(vendor_code(db_err.as_ref()));
                if let Some(state) = sql_state(db_err.as_ref()) {
                    node = node.with_sql_state(state);
                }
                node
            }
            sqlx::Error::Io(_) => ErrorNode::new(err.to_string()).with_sql_state("08006"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ErrorNode::new(err.to_string()).with_sql_state("08001")
            }
            _ => ErrorNode::new(err.to_string()),
        };

        match cause {
            Some(cause) => node.with_cause(cause),
            None => node,
        }
    }
}

fn sql_state(db_err: &(dyn DatabaseError + 'static)) -> Option<String> {
    // SQLite reports its numeric result code through `code()`, not a SQLSTATE.
    if db_err
        .try_downcast_ref::<sqlx::sqlite::SqliteError>()
        .is_some()
    {
        return None;
    }
    db_err.code().map(|c| c.into_owned())
}

fn vendor_code(db_err: &(dyn DatabaseError + 'static)) -> i32 {
    if let Some(mysql) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
        return i32::from(mysql.number());
    }
    db_err
        .code()
        .and_then(|c| c.parse::<i32>().ok())
        .unwrap_or(0)
}
