//! Background worker applying deferred index jobs.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::ledger::IndexLedger;
use crate::queue::{IndexJob, IndexOperation};
use post_search_repository::{IndexSyncError, SearchEngineClient};

/// Apply one job to the search engine and settle the record's ledger entry.
pub(crate) async fn apply_job(
    search: &dyn SearchEngineClient,
    ledger: &IndexLedger,
    index: &str,
    job: &IndexJob,
) -> Result<(), IndexSyncError> {
    let record_id = job.record_id;
    let doc_id = record_id.to_string();

    let result = match &job.operation {
        IndexOperation::Upsert(document) => search
            .index_document(index, &doc_id, document)
            .await
            .map(|()| {
                ledger.mark_indexed(record_id);
                debug!(record_id = %record_id, job_id = %job.job_id, "Indexed document");
            })
            .map_err(|e| IndexSyncError::index(record_id, e)),
        IndexOperation::Delete => search
            .delete_document(index, &doc_id)
            .await
            .map(|()| {
                ledger.mark_removed(record_id);
                debug!(record_id = %record_id, job_id = %job.job_id, "Removed document");
            })
            .map_err(|e| IndexSyncError::delete(record_id, e)),
    };

    if let Err(err) = &result {
        ledger.mark_stale(record_id, job.operation.pending(), err);
    }
    ledger.persist(&[record_id]).await;
    result
}

/// Drains an index queue into the search engine.
///
/// Jobs are applied one at a time in queue order, so successive jobs for the
/// same record land in the order they were enqueued. A failed job leaves its
/// record stale in the ledger; the worker keeps going.
pub struct IndexWorker {
    receiver: mpsc::Receiver<IndexJob>,
    search: Arc<dyn SearchEngineClient>,
    ledger: Arc<IndexLedger>,
    index_name: String,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl IndexWorker {
    pub fn new(
        receiver: mpsc::Receiver<IndexJob>,
        search: Arc<dyn SearchEngineClient>,
        ledger: Arc<IndexLedger>,
        index_name: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            receiver,
            search,
            ledger,
            index_name: index_name.into(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sender that stops the worker once the queue is drained.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until shut down or until every queue handle is dropped.
    ///
    /// On shutdown the queue is closed to new jobs and the jobs already
    /// accepted are applied before returning. Returns the number of jobs
    /// applied successfully.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub async fn run(mut self) -> usize {
        info!("Starting index worker");
        let mut applied = 0;

        loop {
            tokio::select! {
                job = self.receiver.recv() => {
                    match job {
                        Some(job) => {
                            if self.process(&job).await {
                                applied += 1;
                            }
                        }
                        None => {
                            info!("Index queue closed");
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Received shutdown signal, draining index queue");
                    self.receiver.close();
                    while let Some(job) = self.receiver.recv().await {
                        if self.process(&job).await {
                            applied += 1;
                        }
                    }
                    break;
                }
            }
        }

        info!(applied, "Index worker stopped");
        applied
    }

    async fn process(&self, job: &IndexJob) -> bool {
        match apply_job(self.search.as_ref(), &self.ledger, &self.index_name, job).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, job_id = %job.job_id, "Index job failed, record left stale");
                false
            }
        }
    }
}
