//! Request and response types for batch index operations.

use post_search_shared::Document;

use crate::errors::SearchError;

/// A document to be written under the given id.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    /// The search document id (the record id rendered as a string).
    pub id: String,
    /// The document body.
    pub document: Document,
}

impl IndexRequest {
    pub fn new(id: impl Into<String>, document: Document) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }
}

/// Result of a batch operation for a single item.
///
/// This struct represents the outcome of a single operation within a batch. It
/// indicates whether the operation succeeded and includes error details if it
/// failed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperationResult {
    /// The search document id.
    pub id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchError>,
}

impl BatchOperationResult {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: SearchError) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This struct provides a complete overview of a bulk operation, including the total
/// number of items processed, how many succeeded and failed, and detailed results for
/// each individual item. This allows callers to handle partial failures gracefully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a summary, deriving the counters from the results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: BatchOperationSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.results.extend(other.results);
    }

    /// Results of the items that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_results_counts() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded("1"),
            BatchOperationResult::failed("2", SearchError::index("mapping conflict")),
            BatchOperationResult::succeeded("3"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn test_merge() {
        let mut summary = BatchOperationSummary::empty();
        summary.merge(BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded("1"),
        ]));
        summary.merge(BatchOperationSummary::from_results(vec![
            BatchOperationResult::failed("2", SearchError::index("boom")),
        ]));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results.len(), 2);
    }
}
