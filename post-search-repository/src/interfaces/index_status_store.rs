//! Index status store trait definition.

use async_trait::async_trait;

use crate::errors::PersistenceError;
use post_search_shared::{LedgerEntry, RecordId};

/// Durable copy of the per-record index ledger.
///
/// Only records whose document is not known to be current are kept, so a
/// stale record outlives the process that saw the failure and a later run
/// can retry it.
#[async_trait]
pub trait IndexStatusStore: Send + Sync {
    /// Insert or replace the entry for a record.
    async fn save(
        &self,
        index: &str,
        id: RecordId,
        entry: &LedgerEntry,
    ) -> Result<(), PersistenceError>;

    /// Drop the entries of the given records. Unknown ids are ignored.
    async fn remove(&self, index: &str, ids: &[RecordId]) -> Result<(), PersistenceError>;

    /// Load the entry for a record.
    async fn find(&self, index: &str, id: RecordId) -> Result<Option<LedgerEntry>, PersistenceError>;

    /// Load every entry of an index, lowest id first.
    async fn load_all(&self, index: &str) -> Result<Vec<(RecordId, LedgerEntry)>, PersistenceError>;
}
