//! Operation outcomes, including partial success.

use post_search_repository::IndexSyncError;
use post_search_shared::RecordId;
use uuid::Uuid;

/// State of the index after a record mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSync {
    /// The document was written to the index.
    Indexed,
    /// The document was removed from the index.
    Removed,
    /// The index write was handed to the deferred queue.
    Enqueued { job_id: Uuid },
    /// The index write failed; the record mutation stands and the document
    /// may be stale until retried.
    Stale(IndexSyncError),
}

impl IndexSync {
    pub fn is_stale(&self) -> bool {
        matches!(self, IndexSync::Stale(_))
    }

    /// The index failure, if any.
    pub fn warning(&self) -> Option<&IndexSyncError> {
        match self {
            IndexSync::Stale(err) => Some(err),
            _ => None,
        }
    }
}

/// Result of a record mutation.
#[derive(Debug, Clone)]
pub struct SyncOutcome<T> {
    /// What the record store returned.
    pub value: T,
    /// What happened on the index side.
    pub index: IndexSync,
}

impl<T> SyncOutcome<T> {
    pub fn new(value: T, index: IndexSync) -> Self {
        Self { value, index }
    }

    /// True if the record mutated but the index may be stale.
    pub fn is_partial(&self) -> bool {
        self.index.is_stale()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Summary of one retry pass over stale records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryReport {
    /// Records a retry was attempted for.
    pub attempted: usize,
    /// Records whose document is consistent again.
    pub recovered: usize,
    /// Records that failed again and stay stale.
    pub failed: usize,
    /// Records past the attempt limit, not retried.
    pub abandoned: Vec<RecordId>,
}
