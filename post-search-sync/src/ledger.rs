//! Per-record index bookkeeping.
//!
//! The ledger is keyed by record id, so marking the same record stale twice
//! leaves a single entry. It is only ever locked for the duration of a map
//! lookup, never across an `.await`.
//!
//! A ledger built with `persistent` mirrors unsettled entries into an
//! `IndexStatusStore`, so stale records survive the process and a later
//! `restore` picks them up again.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use post_search_repository::{IndexStatusStore, PersistenceError};
use post_search_shared::{IndexStatus, RecordId};

pub use post_search_shared::{LedgerEntry, PendingOperation};

/// Error recorded for a write that was in flight when its process stopped.
const INTERRUPTED: &str = "index write interrupted before it settled";

struct Durable {
    store: Arc<dyn IndexStatusStore>,
    index: String,
}

/// Index status of every record the process has touched.
#[derive(Default)]
pub struct IndexLedger {
    entries: Mutex<HashMap<RecordId, LedgerEntry>>,
    durable: Option<Durable>,
}

impl IndexLedger {
    /// A ledger that lives only as long as the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that mirrors unsettled entries of `index` into `store`.
    pub fn persistent(store: Arc<dyn IndexStatusStore>, index: impl Into<String>) -> Self {
        Self {
            entries: Mutex::default(),
            durable: Some(Durable {
                store,
                index: index.into(),
            }),
        }
    }

    /// Current status; records never seen are `Unindexed`.
    pub fn status(&self, id: RecordId) -> IndexStatus {
        self.entries
            .lock()
            .get(&id)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    pub fn entry(&self, id: RecordId) -> Option<LedgerEntry> {
        self.entries.lock().get(&id).cloned()
    }

    /// An index operation for the record has started.
    ///
    /// A record already `Indexing` stays there; the later operation will
    /// settle it.
    pub fn begin(&self, id: RecordId, operation: PendingOperation) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id).or_default();

        match entry.status.transition_to(IndexStatus::Indexing) {
            Some(next) => entry.status = next,
            None => debug!(record_id = %id, status = %entry.status, "Index operation already in flight"),
        }
        entry.pending = Some(operation);
    }

    /// The record's document was written successfully.
    pub fn mark_indexed(&self, id: RecordId) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id).or_default();

        match entry.status.transition_to(IndexStatus::Indexed) {
            Some(next) => {
                *entry = LedgerEntry {
                    status: next,
                    ..Default::default()
                };
            }
            None => debug!(record_id = %id, status = %entry.status, "Ignoring late index success"),
        }
    }

    /// The record's document was removed; the record leaves the ledger.
    pub fn mark_removed(&self, id: RecordId) {
        self.entries.lock().remove(&id);
    }

    /// The index operation failed.
    ///
    /// A failure always leaves the record `Stale`, whatever settled before:
    /// a retry reconciles from the record store, so over-reporting is safe.
    pub fn mark_stale(&self, id: RecordId, operation: PendingOperation, error: &impl Display) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id).or_default();

        if !entry.status.can_transition_to(IndexStatus::Stale) {
            debug!(record_id = %id, status = %entry.status, "Forcing record stale");
        }
        entry.status = IndexStatus::Stale;
        entry.pending = Some(operation);
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        entry.first_failed_at.get_or_insert_with(Utc::now);
    }

    /// Stale records still under the attempt limit, lowest id first.
    pub fn retryable(&self, max_attempts: u32, limit: usize) -> Vec<(RecordId, LedgerEntry)> {
        let mut stale: Vec<(RecordId, LedgerEntry)> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.status.needs_retry() && entry.attempts < max_attempts)
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();

        stale.sort_by_key(|(id, _)| *id);
        stale.truncate(limit);
        stale
    }

    /// Stale records that reached the attempt limit.
    pub fn abandoned(&self, max_attempts: u32) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.status.needs_retry() && entry.attempts >= max_attempts)
            .map(|(id, _)| *id)
            .collect();

        ids.sort();
        ids
    }

    pub fn stale_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.status.needs_retry())
            .count()
    }

    /// Write the current state of records to the durable store.
    ///
    /// Unsettled entries are saved; indexed or removed records are dropped
    /// from the store. Failures are logged and otherwise ignored: the
    /// in-memory entry stays authoritative for this process.
    pub async fn persist(&self, ids: &[RecordId]) {
        let Some(durable) = &self.durable else {
            return;
        };

        let mut settled = Vec::new();
        for &id in ids {
            match self.entry(id) {
                Some(entry) if entry.status != IndexStatus::Indexed => {
                    if let Err(e) = durable.store.save(&durable.index, id, &entry).await {
                        warn!(record_id = %id, error = %e, "Failed to persist index status");
                    }
                }
                _ => settled.push(id),
            }
        }

        if let Err(e) = durable.store.remove(&durable.index, &settled).await {
            warn!(records = settled.len(), error = %e, "Failed to clear persisted index status");
        }
    }

    /// Load entries persisted by earlier runs.
    ///
    /// Records this ledger already tracks keep their in-memory entry. A
    /// record persisted while `Indexing` never settled, so it comes back
    /// `Stale`. Returns the number of entries loaded.
    pub async fn restore(&self) -> Result<usize, PersistenceError> {
        let Some(durable) = &self.durable else {
            return Ok(0);
        };

        let stored = durable.store.load_all(&durable.index).await?;
        let mut entries = self.entries.lock();
        let mut restored = 0;

        for (id, mut entry) in stored {
            if entries.contains_key(&id) {
                continue;
            }
            if entry.status == IndexStatus::Indexing {
                entry.status = IndexStatus::Stale;
                entry.last_error.get_or_insert_with(|| INTERRUPTED.to_string());
                entry.first_failed_at.get_or_insert_with(Utc::now);
            }
            entries.insert(id, entry);
            restored += 1;
        }

        if restored > 0 {
            info!(restored, index = %durable.index, "Restored persisted index status");
        }
        Ok(restored)
    }

    /// Status of a record, falling back to the durable store for records
    /// this process has not touched.
    pub async fn load_status(&self, id: RecordId) -> Result<IndexStatus, PersistenceError> {
        if let Some(entry) = self.entry(id) {
            return Ok(entry.status);
        }
        let Some(durable) = &self.durable else {
            return Ok(IndexStatus::Unindexed);
        };

        Ok(durable
            .store
            .find(&durable.index, id)
            .await?
            .map(|entry| entry.status)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use post_search_repository::InMemoryIndexStatusStore;

    fn id(n: i64) -> RecordId {
        RecordId::new(n)
    }

    #[test]
    fn test_unknown_record_is_unindexed() {
        let ledger = IndexLedger::new();
        assert_eq!(ledger.status(id(1)), IndexStatus::Unindexed);
        assert!(ledger.entry(id(1)).is_none());
    }

    #[test]
    fn test_happy_path() {
        let ledger = IndexLedger::new();

        ledger.begin(id(1), PendingOperation::Upsert);
        assert_eq!(ledger.status(id(1)), IndexStatus::Indexing);

        ledger.mark_indexed(id(1));
        let entry = ledger.entry(id(1)).unwrap();
        assert_eq!(entry.status, IndexStatus::Indexed);
        assert!(entry.pending.is_none());
        assert_eq!(entry.attempts, 0);
    }

    #[test]
    fn test_failure_then_recovery() {
        let ledger = IndexLedger::new();

        ledger.begin(id(1), PendingOperation::Upsert);
        ledger.mark_stale(id(1), PendingOperation::Upsert, &"connection refused");

        let entry = ledger.entry(id(1)).unwrap();
        assert_eq!(entry.status, IndexStatus::Stale);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_error.as_deref(), Some("connection refused"));
        assert!(entry.first_failed_at.is_some());

        ledger.begin(id(1), PendingOperation::Upsert);
        ledger.mark_indexed(id(1));

        let entry = ledger.entry(id(1)).unwrap();
        assert_eq!(entry.status, IndexStatus::Indexed);
        assert!(entry.last_error.is_none());
        assert_eq!(entry.attempts, 0);
    }

    #[test]
    fn test_marking_stale_is_keyed_by_record() {
        let ledger = IndexLedger::new();

        ledger.begin(id(5), PendingOperation::Upsert);
        ledger.mark_stale(id(5), PendingOperation::Upsert, &"timeout");
        ledger.begin(id(5), PendingOperation::Delete);
        ledger.mark_stale(id(5), PendingOperation::Delete, &"timeout");

        assert_eq!(ledger.stale_count(), 1);
        let entry = ledger.entry(id(5)).unwrap();
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.pending, Some(PendingOperation::Delete));
    }

    #[test]
    fn test_late_success_does_not_clear_stale() {
        let ledger = IndexLedger::new();

        ledger.begin(id(1), PendingOperation::Upsert);
        ledger.mark_stale(id(1), PendingOperation::Upsert, &"boom");
        ledger.mark_indexed(id(1));

        assert_eq!(ledger.status(id(1)), IndexStatus::Stale);
    }

    #[test]
    fn test_removed_record_leaves_ledger() {
        let ledger = IndexLedger::new();

        ledger.begin(id(1), PendingOperation::Delete);
        ledger.mark_removed(id(1));

        assert_eq!(ledger.status(id(1)), IndexStatus::Unindexed);
        assert!(ledger.entry(id(1)).is_none());
    }

    #[test]
    fn test_retryable_and_abandoned() {
        let ledger = IndexLedger::new();

        for n in [3, 1, 2] {
            ledger.begin(id(n), PendingOperation::Upsert);
            ledger.mark_stale(id(n), PendingOperation::Upsert, &"down");
        }
        for _ in 0..2 {
            ledger.mark_stale(id(2), PendingOperation::Upsert, &"down");
        }

        let retryable: Vec<RecordId> = ledger.retryable(3, 10).into_iter().map(|(id, _)| id).collect();
        assert_eq!(retryable, vec![id(1), id(3)]);

        let limited = ledger.retryable(3, 1);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].0, id(1));

        assert_eq!(ledger.abandoned(3), vec![id(2)]);
    }

    #[tokio::test]
    async fn test_restore_picks_up_persisted_failures() {
        let store = Arc::new(InMemoryIndexStatusStore::new());
        let before = IndexLedger::persistent(store.clone(), "posts");

        before.begin(id(1), PendingOperation::Upsert);
        before.mark_stale(id(1), PendingOperation::Upsert, &"connection refused");
        before.begin(id(2), PendingOperation::Upsert);
        before.mark_indexed(id(2));
        before.persist(&[id(1), id(2)]).await;

        let after = IndexLedger::persistent(store, "posts");
        assert_eq!(after.status(id(1)), IndexStatus::Unindexed);
        assert_eq!(after.load_status(id(1)).await.unwrap(), IndexStatus::Stale);

        assert_eq!(after.restore().await.unwrap(), 1);
        let retryable = after.retryable(5, 10);
        assert_eq!(retryable.len(), 1);
        assert_eq!(retryable[0].0, id(1));
        assert_eq!(retryable[0].1.attempts, 1);
        assert_eq!(after.status(id(2)), IndexStatus::Unindexed);
    }

    #[tokio::test]
    async fn test_interrupted_write_restores_stale() {
        let store = Arc::new(InMemoryIndexStatusStore::new());
        let before = IndexLedger::persistent(store.clone(), "posts");
        before.begin(id(3), PendingOperation::Delete);
        before.persist(&[id(3)]).await;

        let after = IndexLedger::persistent(store, "posts");
        after.restore().await.unwrap();

        let entry = after.entry(id(3)).unwrap();
        assert_eq!(entry.status, IndexStatus::Stale);
        assert_eq!(entry.pending, Some(PendingOperation::Delete));
        assert_eq!(entry.last_error.as_deref(), Some(INTERRUPTED));
    }

    #[tokio::test]
    async fn test_settled_record_leaves_store() {
        let store = Arc::new(InMemoryIndexStatusStore::new());
        let ledger = IndexLedger::persistent(store.clone(), "posts");

        ledger.begin(id(1), PendingOperation::Upsert);
        ledger.mark_stale(id(1), PendingOperation::Upsert, &"down");
        ledger.persist(&[id(1)]).await;
        ledger.begin(id(1), PendingOperation::Upsert);
        ledger.mark_indexed(id(1));
        ledger.persist(&[id(1)]).await;

        assert!(store.load_all("posts").await.unwrap().is_empty());
        assert_eq!(ledger.load_status(id(1)).await.unwrap(), IndexStatus::Indexed);
    }

    #[tokio::test]
    async fn test_restore_keeps_newer_in_memory_entry() {
        let store = Arc::new(InMemoryIndexStatusStore::new());
        let other = IndexLedger::persistent(store.clone(), "posts");
        other.mark_stale(id(1), PendingOperation::Upsert, &"down");
        other.persist(&[id(1)]).await;

        let ledger = IndexLedger::persistent(store, "posts");
        ledger.begin(id(1), PendingOperation::Upsert);
        ledger.mark_indexed(id(1));

        assert_eq!(ledger.restore().await.unwrap(), 0);
        assert_eq!(ledger.status(id(1)), IndexStatus::Indexed);
    }
}
