//! Index synchronisation error types.

use post_search_shared::RecordId;
use thiserror::Error;

use super::{PersistenceError, SearchError};

/// An index-side failure after the record store write already committed.
///
/// This is never fatal: the record mutation stands and the document is
/// marked stale until a retry reconciles it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexSyncError {
    /// Indexing the record's document failed.
    #[error("Failed to index record {record_id}: {source}")]
    Index {
        record_id: RecordId,
        #[source]
        source: SearchError,
    },

    /// Deleting the record's document failed.
    #[error("Failed to delete document for record {record_id}: {source}")]
    Delete {
        record_id: RecordId,
        #[source]
        source: SearchError,
    },

    /// The deferred index queue refused the job.
    #[error("Failed to enqueue index job for record {record_id}: {reason}")]
    Enqueue { record_id: RecordId, reason: String },

    /// The record was written but could not be read back to derive its
    /// document.
    #[error("Failed to reload record {record_id} after write: {source}")]
    Reload {
        record_id: RecordId,
        #[source]
        source: PersistenceError,
    },
}

impl IndexSyncError {
    /// Create an index failure.
    pub fn index(record_id: RecordId, source: SearchError) -> Self {
        Self::Index { record_id, source }
    }

    /// Create a delete failure.
    pub fn delete(record_id: RecordId, source: SearchError) -> Self {
        Self::Delete { record_id, source }
    }

    /// Create an enqueue failure.
    pub fn enqueue(record_id: RecordId, reason: impl Into<String>) -> Self {
        Self::Enqueue {
            record_id,
            reason: reason.into(),
        }
    }

    /// Create a read-back failure.
    pub fn reload(record_id: RecordId, source: PersistenceError) -> Self {
        Self::Reload { record_id, source }
    }

    /// The record whose document may now be stale.
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Index { record_id, .. }
            | Self::Delete { record_id, .. }
            | Self::Enqueue { record_id, .. }
            | Self::Reload { record_id, .. } => *record_id,
        }
    }
}
