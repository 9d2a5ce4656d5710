//! Query error types.

use thiserror::Error;

use super::SearchError;

/// Errors surfaced by a search request. There is no fallback to the record
/// store, which is not a search backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The query was rejected before reaching the engine.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The engine failed to execute the query.
    #[error("Search failed: {0}")]
    SearchFailed(#[from] SearchError),
}

impl QueryError {
    /// Create an invalid query error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }
}
