//! Error types for the post search repository.
//!
//! The taxonomy follows the failure policy of the sync layer:
//! `PersistenceError` aborts an operation, `IndexSyncError` is reported as a
//! partial success, and `QueryError` is surfaced directly to the caller.

mod index_sync_error;
mod persistence_error;
mod query_error;
mod search_error;

pub use index_sync_error::IndexSyncError;
pub use persistence_error::PersistenceError;
pub use query_error::QueryError;
pub use search_error::SearchError;
