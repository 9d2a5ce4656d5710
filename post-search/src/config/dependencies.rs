//! Dependency initialization and wiring for the post search service.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{RecordStoreBackend, Settings};
use crate::AppError;
use post_search_repository::{
    InMemoryIndexStatusStore, InMemoryRecordStore, IndexStatusStore, OpenSearchClient,
    PostgresIndexStatusStore, PostgresRecordStore, RecordStore, SearchEngineClient,
};
use post_search_shared::Post;
use post_search_sync::{ChannelIndexQueue, IndexLedger, IndexWorker, SyncConfig, SyncMode, SyncRepository};

/// A running index worker and the handle that stops it.
struct WorkerHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<usize>,
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The sync repository for posts.
    pub repository: SyncRepository<Post>,
    worker: Option<WorkerHandle>,
}

impl Dependencies {
    /// Initialize all dependencies from settings.
    ///
    /// In deferred mode an index worker is started on the current runtime;
    /// call `shutdown` to drain it before exiting.
    pub async fn new(settings: &Settings) -> Result<Self, AppError> {
        info!(
            hosts = ?settings.search.hosts,
            index = %settings.index_name,
            sync_mode = ?settings.sync_mode,
            record_store = ?settings.record_store,
            "Initializing dependencies"
        );

        // Index status shares the record store's backend.
        let (store, status_store): (Arc<dyn RecordStore<Post>>, Arc<dyn IndexStatusStore>) =
            match settings.record_store {
                RecordStoreBackend::Postgres => {
                    let store = PostgresRecordStore::connect(&settings.postgres)
                        .await
                        .map_err(|e| {
                            AppError::config(format!("Failed to connect to PostgreSQL: {}", e))
                        })?;
                    let status_store: Arc<dyn IndexStatusStore> =
                        Arc::new(PostgresIndexStatusStore::new(store.pool().clone()));
                    let store: Arc<dyn RecordStore<Post>> = Arc::new(store);
                    (store, status_store)
                }
                RecordStoreBackend::Memory => {
                    warn!("Using in-memory record store, records are lost on exit");
                    let store: Arc<dyn RecordStore<Post>> =
                        Arc::new(InMemoryRecordStore::<Post>::new());
                    let status_store: Arc<dyn IndexStatusStore> =
                        Arc::new(InMemoryIndexStatusStore::new());
                    (store, status_store)
                }
            };

        let search_client = OpenSearchClient::new(settings.search.clone())
            .map_err(|e| AppError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        // An unreachable engine is tolerated: record writes still succeed and
        // the affected documents are reported stale.
        match search_client.health_check().await {
            Ok(true) => info!("OpenSearch connection verified"),
            Ok(false) => warn!("OpenSearch cluster is unhealthy"),
            Err(e) => warn!(error = %e, "OpenSearch health check failed"),
        }

        let search: Arc<dyn SearchEngineClient> = Arc::new(search_client);
        let ledger = Arc::new(IndexLedger::persistent(
            status_store,
            settings.index_name.clone(),
        ));
        let config = SyncConfig {
            max_retry_attempts: settings.max_retry_attempts,
            ..SyncConfig::with_index_name(settings.index_name.clone())
        };

        let mut repository = SyncRepository::new(store, search.clone())
            .with_config(config)
            .with_ledger(ledger.clone());

        let worker = match settings.sync_mode {
            SyncMode::Synchronous => None,
            SyncMode::Deferred => {
                let (queue, receiver) = ChannelIndexQueue::channel(settings.queue_capacity);
                repository = repository.with_queue(Arc::new(queue));

                let worker = IndexWorker::new(receiver, search, ledger, settings.index_name.clone());
                let shutdown_tx = worker.shutdown_handle();
                let task = tokio::spawn(worker.run());

                info!(capacity = settings.queue_capacity, "Index worker started");
                Some(WorkerHandle { shutdown_tx, task })
            }
        };

        Ok(Self { repository, worker })
    }

    /// Stop the index worker, if any, after it has drained the queue.
    pub async fn shutdown(self) {
        let Some(worker) = self.worker else {
            return;
        };

        let _ = worker.shutdown_tx.send(());
        match worker.task.await {
            Ok(applied) => info!(applied, "Index worker drained"),
            Err(e) => error!(error = %e, "Index worker task failed"),
        }
    }
}
