//! Error types for the sync layer.

use post_search_repository::{PersistenceError, QueryError, SearchError};
use post_search_shared::RecordId;
use thiserror::Error;

/// Errors that abort a sync repository operation.
///
/// Index-side failures after a committed store write are not errors; they
/// are reported through `SyncOutcome`.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The record store failed; the index was not touched.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A search request failed.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// An administrative index operation failed.
    #[error("Search engine error: {0}")]
    Search(#[from] SearchError),

    /// No record has this id.
    #[error("Record {0} not found")]
    NotFound(RecordId),
}

impl SyncError {
    /// Create a not found error.
    pub fn not_found(id: RecordId) -> Self {
        Self::NotFound(id)
    }
}
