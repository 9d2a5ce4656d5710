//! In-memory record and index status stores.
//!
//! Each keeps its rows in an ordered map behind a single async lock, so each
//! call is atomic. Record ids are assigned sequentially starting at 1.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::PersistenceError;
use crate::interfaces::{IndexStatusStore, RecordStore};
use post_search_shared::{Entity, LedgerEntry, RecordId};

struct Table<E> {
    rows: BTreeMap<RecordId, E>,
    next_id: i64,
}

/// Record store backed by process memory.
pub struct InMemoryRecordStore<E: Entity> {
    table: RwLock<Table<E>>,
}

impl<E: Entity> InMemoryRecordStore<E> {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.rows.is_empty()
    }
}

impl<E: Entity> Default for InMemoryRecordStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RecordStore<E> for InMemoryRecordStore<E> {
    async fn insert(&self, attributes: &E::NewAttributes) -> Result<RecordId, PersistenceError> {
        let mut table = self.table.write().await;
        let id = RecordId::new(table.next_id);
        table.next_id += 1;
        table.rows.insert(id, E::from_attributes(id, attributes.clone()));

        debug!(record_id = %id, "Inserted record");
        Ok(id)
    }

    async fn update(&self, id: RecordId, changes: &E::Changes) -> Result<bool, PersistenceError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(entity) => {
                entity.apply_changes(changes.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: RecordId) -> Result<bool, PersistenceError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<E>, PersistenceError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<E>, PersistenceError> {
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let table = self.table.read().await;
        Ok(table
            .rows
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, entity)| entity.clone())
            .collect())
    }
}

/// Index status store backed by process memory.
///
/// Entries live as long as the value, so sharing one between ledgers
/// carries stale records from one to the next.
#[derive(Default)]
pub struct InMemoryIndexStatusStore {
    entries: RwLock<BTreeMap<(String, RecordId), LedgerEntry>>,
}

impl InMemoryIndexStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStatusStore for InMemoryIndexStatusStore {
    async fn save(
        &self,
        index: &str,
        id: RecordId,
        entry: &LedgerEntry,
    ) -> Result<(), PersistenceError> {
        self.entries
            .write()
            .await
            .insert((index.to_string(), id), entry.clone());
        Ok(())
    }

    async fn remove(&self, index: &str, ids: &[RecordId]) -> Result<(), PersistenceError> {
        let mut entries = self.entries.write().await;
        for id in ids {
            entries.remove(&(index.to_string(), *id));
        }
        Ok(())
    }

    async fn find(&self, index: &str, id: RecordId) -> Result<Option<LedgerEntry>, PersistenceError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(index.to_string(), id))
            .cloned())
    }

    async fn load_all(&self, index: &str) -> Result<Vec<(RecordId, LedgerEntry)>, PersistenceError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|((entry_index, _), _)| entry_index == index)
            .map(|((_, id), entry)| (*id, entry.clone()))
            .collect())
    }
}
