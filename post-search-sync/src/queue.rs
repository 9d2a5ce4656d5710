//! Deferred dispatch of index jobs.
//!
//! In deferred mode the sync repository's contract ends at "enqueued": the
//! job is handed to an `IndexQueue` and applied later by an `IndexWorker`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::ledger::PendingOperation;
use post_search_repository::IndexSyncError;
use post_search_shared::{Document, RecordId};

/// What to do with a record's document.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperation {
    /// Write the document, replacing any previous version.
    Upsert(Document),
    /// Remove the document.
    Delete,
}

impl IndexOperation {
    pub fn pending(&self) -> PendingOperation {
        match self {
            IndexOperation::Upsert(_) => PendingOperation::Upsert,
            IndexOperation::Delete => PendingOperation::Delete,
        }
    }
}

/// One index-side operation for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexJob {
    pub job_id: Uuid,
    pub record_id: RecordId,
    pub operation: IndexOperation,
    pub created_at: DateTime<Utc>,
}

impl IndexJob {
    fn new(record_id: RecordId, operation: IndexOperation) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            record_id,
            operation,
            created_at: Utc::now(),
        }
    }

    /// Job writing the record's current document.
    pub fn upsert(record_id: RecordId, document: Document) -> Self {
        Self::new(record_id, IndexOperation::Upsert(document))
    }

    /// Job removing the record's document.
    pub fn delete(record_id: RecordId) -> Self {
        Self::new(record_id, IndexOperation::Delete)
    }
}

/// A queue accepting index jobs for later delivery.
#[async_trait]
pub trait IndexQueue: Send + Sync {
    /// Hand a job over. Success means enqueued, not delivered.
    async fn enqueue(&self, job: IndexJob) -> Result<(), IndexSyncError>;
}

/// In-process queue over a bounded channel.
///
/// Enqueueing never waits: a full or closed channel is reported as an
/// index sync failure so the caller's request is not held up.
#[derive(Debug, Clone)]
pub struct ChannelIndexQueue {
    sender: mpsc::Sender<IndexJob>,
}

impl ChannelIndexQueue {
    /// Create a queue and the receiver an `IndexWorker` drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<IndexJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl IndexQueue for ChannelIndexQueue {
    async fn enqueue(&self, job: IndexJob) -> Result<(), IndexSyncError> {
        let record_id = job.record_id;
        let job_id = job.job_id;

        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => IndexSyncError::enqueue(record_id, "index queue is full"),
            TrySendError::Closed(_) => IndexSyncError::enqueue(record_id, "index queue is closed"),
        })?;

        debug!(record_id = %record_id, job_id = %job_id, "Enqueued index job");
        Ok(())
    }
}
