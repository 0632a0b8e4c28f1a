//! Reporting partially failed batches.

use crate::diagnostics::Diagnostic;
use crate::models::BatchResult;

/// Reports which statements of a batch ran before it stopped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcomeReporter;

impl BatchOutcomeReporter {
    /// The error header (when an error is attached) followed by one entry per
    /// statement, in execution order.
    pub fn diagnostics(&self, result: &BatchResult) -> Vec<Diagnostic> {
        let header = result.error.as_ref().map(Diagnostic::batch_failure);
        header
            .into_iter()
            .chain(
                result
                    .update_counts
                    .iter()
                    .enumerate()
                    .map(|(index, &count)| Diagnostic::UpdateCount { index, count }),
            )
            .collect()
    }

    pub fn report(&self, result: &BatchResult) {
        for diagnostic in self.diagnostics(result) {
            diagnostic.emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorNode;

    #[test]
    fn test_header_then_counts_in_order() {
        let result = BatchResult::new(
            vec![1, 1, -1],
            Some(
                ErrorNode::new("Duplicate entry '101' for key 'PRIMARY'")
                    .with_sql_state("23000")
                    .with_vendor_code(1062),
            ),
        );
        let out = BatchOutcomeReporter.diagnostics(&result);

        assert_eq!(out.len(), 4);
        assert_eq!(
            out[0],
            Diagnostic::BatchFailure {
                message: "Duplicate entry '101' for key 'PRIMARY'".to_string(),
                sql_state: Some("23000".to_string()),
                vendor_code: 1062,
            }
        );
        let counts: Vec<i64> = out[1..]
            .iter()
            .map(|d| match d {
                Diagnostic::UpdateCount { count, .. } => *count,
                other => panic!("unexpected diagnostic: {:?}", other),
            })
            .collect();
        assert_eq!(counts, vec![1, 1, -1]);
    }

    #[test]
    fn test_no_error_only_counts() {
        let result = BatchResult::new(vec![3], None);
        let out = BatchOutcomeReporter.diagnostics(&result);
        assert_eq!(out, vec![Diagnostic::UpdateCount { index: 0, count: 3 }]);
    }

    #[test]
    fn test_empty_result() {
        assert!(
            BatchOutcomeReporter
                .diagnostics(&BatchResult::default())
                .is_empty()
        );
    }
}
