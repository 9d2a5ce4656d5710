//! Search engine client trait definition.
//!
//! This module defines the abstract interface for search engine operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::{BatchOperationSummary, IndexRequest};
use post_search_shared::{Document, SearchQuery, SearchResponse};

/// Abstract interface for search engine operations.
///
/// This trait defines all the operations required to interact with a search engine.
/// Implementations can be swapped for different backends (OpenSearch, mock, etc.)
/// enabling easy testing and potential future migrations.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, SearchError>` for consistent error handling.
#[async_trait]
pub trait SearchEngineClient: Send + Sync {
    /// Index a single document under the given id.
    ///
    /// If a document with the same id already exists, it is replaced, so
    /// indexing the same document twice leaves the same end state.
    ///
    /// # Arguments
    ///
    /// * `index` - The index to write to
    /// * `id` - The document id
    /// * `document` - The document body
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), SearchError>;

    /// Index multiple documents in a single bulk operation.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcomes
    /// * `Err(SearchError)` - If the bulk request fails as a whole
    async fn bulk_index_documents(
        &self,
        index: &str,
        requests: &[IndexRequest],
    ) -> Result<BatchOperationSummary, SearchError>;

    /// Delete a document from the index.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was deleted (or didn't exist)
    /// * `Err(SearchError)` - If the deletion fails
    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchError>;

    /// Fetch the stored copy of a document, or `None` if it does not exist.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>, SearchError>;

    /// Execute a search query against the index.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let query = SearchQuery::new("hello").with_fields(&["name", "content"]);
    /// let response = client.search("posts", &query).await?;
    /// println!("Found {} results", response.total);
    /// ```
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    /// Ensure the index exists with mappings for the given text fields.
    ///
    /// This should be called during application startup.
    async fn ensure_index_exists(&self, index: &str, fields: &[&str]) -> Result<(), SearchError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(SearchError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchError>;
}
