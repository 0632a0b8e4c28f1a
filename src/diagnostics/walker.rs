//! Walking backend error chains.

use crate::diagnostics::{Diagnostic, ErrorClassifier};
use crate::models::ErrorNode;

/// Renders error and warning chains as diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorChainWalker {
    classifier: ErrorClassifier,
}

impl ErrorChainWalker {
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }

    /// Diagnostics for every non-ignorable sibling of `root`.
    ///
    /// Each reported sibling is followed by the cause chain of `root` itself,
    /// so with several reported siblings the root causes appear once per
    /// sibling.
    pub fn diagnostics(&self, root: &ErrorNode) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for node in root.siblings() {
            if self.classifier.is_ignorable(node.sql_state.as_deref()) {
                continue;
            }
            out.push(Diagnostic::error(node));
            out.extend(root.causes().map(Diagnostic::cause));
        }
        out
    }

    /// Emit the diagnostics from [`diagnostics`](Self::diagnostics).
    pub fn report(&self, root: &ErrorNode) {
        for diagnostic in self.diagnostics(root) {
            diagnostic.emit();
        }
    }

    /// Diagnostics for every sibling, each followed by its own causes.
    pub fn diagnostics_all(&self, root: &ErrorNode) -> Vec<Diagnostic> {
        root.siblings()
            .flat_map(|node| {
                std::iter::once(Diagnostic::error(node)).chain(node.causes().map(Diagnostic::cause))
            })
            .collect()
    }

    /// Emit the diagnostics from [`diagnostics_all`](Self::diagnostics_all).
    pub fn report_all(&self, root: &ErrorNode) {
        for diagnostic in self.diagnostics_all(root) {
            diagnostic.emit();
        }
    }

    pub fn warning_diagnostics(&self, warnings: Option<&ErrorNode>) -> Vec<Diagnostic> {
        warnings
            .map(|root| root.siblings().map(Diagnostic::warning).collect())
            .unwrap_or_default()
    }

    /// Emit one warning entry per sibling of `warnings`.
    pub fn report_warnings(&self, warnings: Option<&ErrorNode>) {
        for diagnostic in self.warning_diagnostics(warnings) {
            diagnostic.emit();
        }
    }
}
