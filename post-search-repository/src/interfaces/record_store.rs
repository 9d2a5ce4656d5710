//! Record store trait definition.

use async_trait::async_trait;

use crate::errors::PersistenceError;
use post_search_shared::{Entity, RecordId};

/// Authoritative storage for entities of type `E`.
///
/// Every call is assumed to be atomic on its own; the sync layer never
/// spans a transaction across calls.
#[async_trait]
pub trait RecordStore<E: Entity>: Send + Sync {
    /// Insert a new record and return the identifier the store assigned.
    async fn insert(&self, attributes: &E::NewAttributes) -> Result<RecordId, PersistenceError>;

    /// Apply a partial update.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the record existed and was updated
    /// * `Ok(false)` - If no record has this id
    async fn update(&self, id: RecordId, changes: &E::Changes) -> Result<bool, PersistenceError>;

    /// Delete a record. Returns `false` if no record has this id.
    async fn delete(&self, id: RecordId) -> Result<bool, PersistenceError>;

    /// Load a record.
    async fn find_by_id(&self, id: RecordId) -> Result<Option<E>, PersistenceError>;

    /// Load up to `limit` records with ids greater than `after`, in id order.
    async fn find_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<E>, PersistenceError>;
}
