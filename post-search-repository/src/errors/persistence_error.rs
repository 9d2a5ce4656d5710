//! Record store error types.

use post_search_shared::RecordId;
use thiserror::Error;

/// Errors raised by a record store.
///
/// Any of these aborts the whole sync operation; the search index is never
/// touched after a failed store write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// The store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A write violated a constraint of the store.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A statement failed for any other reason.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema bootstrap failed.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A record reported as written could not be read back.
    #[error("Record {0} missing after write")]
    MissingAfterWrite(RecordId),
}

impl PersistenceError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a constraint violation error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    /// Create a query failure.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaError(msg.into())
    }
}
