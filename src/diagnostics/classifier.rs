//! Classification of benign backend errors.
//!
//! Some failures only mean "this object is already there" and are expected
//! when setup scripts are re-run. They stay failures for the caller, but the
//! diagnostics layer does not print them.

use tracing::debug;

/// A state code that denotes an already-present object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnorableState {
    pub code: &'static str,
    pub description: &'static str,
}

/// State codes that are silently tolerated.
pub const IGNORABLE_SQL_STATES: &[IgnorableState] = &[
    IgnorableState {
        code: "X0Y32",
        description: "Jar file already exists in schema",
    },
    IgnorableState {
        code: "42Y55",
        description: "Table already exists in schema",
    },
];

/// Decides whether a state code should be tolerated.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    table: &'static [IgnorableState],
}

impl ErrorClassifier {
    /// Classifier over a custom table.
    pub const fn with_table(table: &'static [IgnorableState]) -> Self {
        Self { table }
    }

    /// Check a state code against the table, ignoring ASCII case.
    ///
    /// A missing code is never ignorable.
    pub fn is_ignorable(&self, sql_state: Option<&str>) -> bool {
        let Some(state) = sql_state else {
            debug!("The SQL state is not defined");
            return false;
        };
        self.lookup(state).is_some()
    }

    /// The table entry matching `sql_state`, if any.
    pub fn lookup(&self, sql_state: &str) -> Option<&'static IgnorableState> {
        self.table
            .iter()
            .find(|entry| entry.code.eq_ignore_ascii_case(sql_state))
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::with_table(IGNORABLE_SQL_STATES)
    }
}

/// Check a state code against the default table.
pub fn is_ignorable(sql_state: Option<&str>) -> bool {
    ErrorClassifier::default().is_ignorable(sql_state)
}
