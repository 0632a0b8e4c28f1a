//! Batch execution outcomes.

use crate::models::ErrorNode;

/// The statement failed; the backend continued or stopped after it.
pub const EXECUTE_FAILED: i64 = -3;

/// The statement succeeded but the backend did not report a row count.
pub const SUCCESS_NO_INFO: i64 = -2;

/// Result of a batch that stopped before completing every statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchResult {
    /// One entry per executed statement, in execution order: rows affected or
    /// one of the sentinels above.
    pub update_counts: Vec<i64>,
    pub error: Option<ErrorNode>,
}

impl BatchResult {
    pub fn new(update_counts: Vec<i64>, error: Option<ErrorNode>) -> Self {
        Self {
            update_counts,
            error,
        }
    }

    /// Number of statements that completed before the first failure.
    pub fn succeeded(&self) -> usize {
        self.update_counts
            .iter()
            .take_while(|&&count| count != EXECUTE_FAILED)
            .count()
    }

    /// Index of the first failed statement, if one is marked.
    pub fn failed_index(&self) -> Option<usize> {
        self.update_counts
            .iter()
            .position(|&count| count == EXECUTE_FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_stops_at_failure() {
        let result = BatchResult::new(vec![1, SUCCESS_NO_INFO, EXECUTE_FAILED], None);
        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.failed_index(), Some(2));
    }

    #[test]
    fn test_no_failure_marker() {
        let result = BatchResult::new(vec![1, 1], Some(ErrorNode::new("late failure")));
        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.failed_index(), None);
    }
}
