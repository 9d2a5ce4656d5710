//! The sync repository.
//!
//! Mediates between the authoritative record store and the search index.
//! Every mutation is written to the store first; the derived document is
//! mirrored into the index only once the store write has committed.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{SyncConfig, SyncMode};
use crate::errors::SyncError;
use crate::ledger::{IndexLedger, PendingOperation};
use crate::outcome::{IndexSync, RetryReport, SyncOutcome};
use crate::queue::{IndexJob, IndexOperation, IndexQueue};
use crate::worker::apply_job;
use post_search_repository::{
    BatchOperationResult, BatchOperationSummary, IndexRequest, IndexSyncError, PersistenceError,
    QueryError, RecordStore, SearchEngineClient, SearchError,
};
use post_search_shared::{Document, Entity, IndexStatus, RecordId, SearchQuery, SearchResponse};

enum Dispatch {
    Synchronous,
    Deferred(Arc<dyn IndexQueue>),
}

/// Keeps a search index eventually consistent with a record store.
///
/// Record store failures abort the operation before the index is touched.
/// Index failures after a committed store write never fail the operation:
/// they come back as a partial success and the record is left `Stale` in
/// the ledger until `retry_stale` reconciles it.
pub struct SyncRepository<E: Entity> {
    store: Arc<dyn RecordStore<E>>,
    search: Arc<dyn SearchEngineClient>,
    dispatch: Dispatch,
    ledger: Arc<IndexLedger>,
    config: SyncConfig,
    index_name: String,
}

impl<E: Entity> SyncRepository<E> {
    /// Create a repository writing the index synchronously.
    pub fn new(store: Arc<dyn RecordStore<E>>, search: Arc<dyn SearchEngineClient>) -> Self {
        Self {
            store,
            search,
            dispatch: Dispatch::Synchronous,
            ledger: Arc::new(IndexLedger::new()),
            config: SyncConfig::default(),
            index_name: E::index_name().to_string(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.index_name = config
            .index_name
            .clone()
            .unwrap_or_else(|| E::index_name().to_string());
        self.config = config;
        self
    }

    /// Hand index writes to a queue instead of applying them in-line.
    pub fn with_queue(mut self, queue: Arc<dyn IndexQueue>) -> Self {
        self.dispatch = Dispatch::Deferred(queue);
        self
    }

    /// Share a ledger, typically with the `IndexWorker` draining the queue.
    pub fn with_ledger(mut self, ledger: Arc<IndexLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn mode(&self) -> SyncMode {
        match self.dispatch {
            Dispatch::Synchronous => SyncMode::Synchronous,
            Dispatch::Deferred(_) => SyncMode::Deferred,
        }
    }

    pub fn ledger(&self) -> &Arc<IndexLedger> {
        &self.ledger
    }

    /// Create a record and index its document.
    ///
    /// Once the insert has committed the call succeeds. If the new record
    /// cannot be read back, the returned entity is built from `attributes`
    /// and the record is left stale for `retry_stale`.
    #[instrument(skip(self, attributes), fields(index = %self.index_name))]
    pub async fn create(&self, attributes: E::NewAttributes) -> Result<SyncOutcome<E>, SyncError> {
        let id = self.store.insert(&attributes).await?;
        info!(record_id = %id, "Created record");

        let outcome = match self.reload(id).await {
            Ok(entity) => {
                let index = self
                    .dispatch(IndexJob::upsert(id, entity.to_document()))
                    .await;
                SyncOutcome::new(entity, index)
            }
            Err(e) => {
                let index = self.defer_to_retry(e).await;
                SyncOutcome::new(E::from_attributes(id, attributes), index)
            }
        };
        Ok(outcome)
    }

    /// Apply a partial update and re-index the record's full document.
    ///
    /// The record is loaded first so a missing id fails before anything is
    /// written. After the update commits, the record is reloaded so fields
    /// outside the change set keep their stored values; if that read fails
    /// the changes are applied to the earlier copy instead and the record
    /// is left stale.
    #[instrument(skip(self, changes), fields(index = %self.index_name))]
    pub async fn update(&self, id: RecordId, changes: E::Changes) -> Result<SyncOutcome<E>, SyncError> {
        let mut current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SyncError::not_found(id))?;

        if !self.store.update(id, &changes).await? {
            return Err(SyncError::not_found(id));
        }
        info!(record_id = %id, "Updated record");

        let outcome = match self.reload(id).await {
            Ok(entity) => {
                let index = self
                    .dispatch(IndexJob::upsert(id, entity.to_document()))
                    .await;
                SyncOutcome::new(entity, index)
            }
            Err(e) => {
                let index = self.defer_to_retry(e).await;
                current.apply_changes(changes);
                SyncOutcome::new(current, index)
            }
        };
        Ok(outcome)
    }

    /// Delete a record and remove its document.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub async fn delete(&self, id: RecordId) -> Result<SyncOutcome<()>, SyncError> {
        if !self.store.delete(id).await? {
            return Err(SyncError::not_found(id));
        }

        info!(record_id = %id, "Deleted record");
        let index = self.dispatch(IndexJob::delete(id)).await;
        Ok(SyncOutcome::new((), index))
    }

    /// Run a full-text query over the entity's searchable fields.
    ///
    /// Hits are references only; callers resolve them against the record
    /// store.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, SyncError> {
        query.validate().map_err(QueryError::invalid)?;
        let query = query.with_fields(E::searchable_fields());

        let response = self
            .search
            .search(&self.index_name, &query)
            .await
            .map_err(QueryError::from)?;

        info!(hits = response.hits.len(), total = response.total, "Search completed");
        Ok(response)
    }

    /// Load a record from the store.
    pub async fn find(&self, id: RecordId) -> Result<Option<E>, SyncError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// The engine's copy of a record's document.
    pub async fn indexed_document(&self, id: RecordId) -> Result<Option<Document>, SyncError> {
        Ok(self
            .search
            .get_document(&self.index_name, &id.to_string())
            .await?)
    }

    /// Create the index with the entity's searchable fields if it is missing.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub async fn ensure_index(&self) -> Result<(), SyncError> {
        self.search
            .ensure_index_exists(&self.index_name, E::searchable_fields())
            .await?;
        Ok(())
    }

    /// Bulk-index every record in the store, page by page.
    ///
    /// Records the engine rejects are marked stale. A bulk request that
    /// fails outright marks its whole page stale and stops the pass.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub async fn reindex_all(&self) -> Result<BatchOperationSummary, SyncError> {
        let batch_size = self.config.reindex_batch_size.max(1);
        let mut summary = BatchOperationSummary::empty();
        let mut after = None;

        loop {
            let page = self.store.find_page(after, batch_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.id());

            let requests: Vec<IndexRequest> = page
                .iter()
                .map(|entity| IndexRequest::new(entity.id().to_string(), entity.to_document()))
                .collect();
            let ids: Vec<RecordId> = page.iter().map(|entity| entity.id()).collect();
            for &id in &ids {
                self.ledger.begin(id, PendingOperation::Upsert);
            }

            match self
                .search
                .bulk_index_documents(&self.index_name, &requests)
                .await
            {
                Ok(batch) => {
                    self.settle_batch(&batch);
                    self.ledger.persist(&ids).await;
                    summary.merge(batch);
                }
                Err(e) => {
                    warn!(error = %e, records = ids.len(), "Bulk index request failed");
                    for &id in &ids {
                        self.ledger.mark_stale(
                            id,
                            PendingOperation::Upsert,
                            &IndexSyncError::index(id, e.clone()),
                        );
                    }
                    self.ledger.persist(&ids).await;
                    return Err(e.into());
                }
            }

            if page.len() < batch_size {
                break;
            }
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Reindex completed"
        );
        Ok(summary)
    }

    /// Reconcile stale records with the store.
    ///
    /// A record still in the store has its current document re-indexed; a
    /// record gone from the store has its document deleted. Records past
    /// the attempt limit are reported as abandoned and not retried.
    ///
    /// Entries persisted by earlier runs are loaded first; if that fails
    /// only the records this process saw are retried.
    #[instrument(skip(self), fields(index = %self.index_name))]
    pub async fn retry_stale(&self) -> Result<RetryReport, SyncError> {
        if let Err(e) = self.ledger.restore().await {
            warn!(error = %e, "Could not load persisted index status");
        }

        let max_attempts = self.config.max_retry_attempts;
        let mut report = RetryReport {
            abandoned: self.ledger.abandoned(max_attempts),
            ..Default::default()
        };

        for (id, entry) in self
            .ledger
            .retryable(max_attempts, self.config.retry_batch_size)
        {
            let job = match self.store.find_by_id(id).await? {
                Some(entity) => IndexJob::upsert(id, entity.to_document()),
                None => IndexJob::delete(id),
            };

            report.attempted += 1;
            self.ledger.begin(id, job.operation.pending());

            match apply_job(self.search.as_ref(), &self.ledger, &self.index_name, &job).await {
                Ok(()) => report.recovered += 1,
                Err(e) => {
                    warn!(record_id = %id, attempts = entry.attempts + 1, error = %e, "Retry failed");
                    report.failed += 1;
                }
            }
        }

        if !report.abandoned.is_empty() {
            warn!(count = report.abandoned.len(), "Stale records past the retry limit");
        }
        info!(
            attempted = report.attempted,
            recovered = report.recovered,
            failed = report.failed,
            "Retry pass completed"
        );
        Ok(report)
    }

    /// Index status as tracked by this process.
    pub fn index_status(&self, id: RecordId) -> IndexStatus {
        self.ledger.status(id)
    }

    /// Index status including entries persisted by earlier runs.
    ///
    /// Indexed records are not persisted, so a record with no entry
    /// anywhere is reported `Indexed` when the engine holds its document.
    pub async fn load_index_status(&self, id: RecordId) -> Result<IndexStatus, SyncError> {
        let status = self.ledger.load_status(id).await?;
        if status != IndexStatus::Unindexed {
            return Ok(status);
        }

        Ok(match self.indexed_document(id).await? {
            Some(_) => IndexStatus::Indexed,
            None => IndexStatus::Unindexed,
        })
    }

    /// Read back a record that was just written.
    async fn reload(&self, id: RecordId) -> Result<E, IndexSyncError> {
        match self.store.find_by_id(id).await {
            Ok(Some(entity)) => Ok(entity),
            Ok(None) => Err(IndexSyncError::reload(
                id,
                PersistenceError::MissingAfterWrite(id),
            )),
            Err(e) => Err(IndexSyncError::reload(id, e)),
        }
    }

    /// Leave a committed record for `retry_stale` without touching the index.
    async fn defer_to_retry(&self, err: IndexSyncError) -> IndexSync {
        let record_id = err.record_id();
        self.ledger.mark_stale(record_id, PendingOperation::Upsert, &err);
        self.ledger.persist(&[record_id]).await;

        warn!(record_id = %record_id, error = %err, "Record saved but could not be reloaded");
        IndexSync::Stale(err)
    }

    async fn dispatch(&self, job: IndexJob) -> IndexSync {
        let record_id = job.record_id;
        let pending = job.operation.pending();
        self.ledger.begin(record_id, pending);

        let index = match &self.dispatch {
            Dispatch::Synchronous => self.apply_detached(job).await,
            Dispatch::Deferred(queue) => {
                let job_id = job.job_id;
                let index = match queue.enqueue(job).await {
                    Ok(()) => IndexSync::Enqueued { job_id },
                    Err(e) => {
                        self.ledger.mark_stale(record_id, pending, &e);
                        IndexSync::Stale(e)
                    }
                };
                self.ledger.persist(&[record_id]).await;
                index
            }
        };

        if let Some(e) = index.warning() {
            warn!(record_id = %record_id, error = %e, "Record saved but index may be stale");
        }
        index
    }

    /// Apply a job on its own task so that dropping the caller's future does
    /// not abort an index write already initiated.
    async fn apply_detached(&self, job: IndexJob) -> IndexSync {
        let record_id = job.record_id;
        let pending = job.operation.pending();
        let removal = matches!(job.operation, IndexOperation::Delete);
        let search = Arc::clone(&self.search);
        let ledger = Arc::clone(&self.ledger);
        let index_name = self.index_name.clone();

        let handle = tokio::spawn(async move {
            apply_job(search.as_ref(), &ledger, &index_name, &job).await
        });

        match handle.await {
            Ok(Ok(())) if removal => IndexSync::Removed,
            Ok(Ok(())) => IndexSync::Indexed,
            Ok(Err(e)) => IndexSync::Stale(e),
            Err(join_err) => {
                let source = SearchError::index(format!("index task failed: {}", join_err));
                let err = if removal {
                    IndexSyncError::delete(record_id, source)
                } else {
                    IndexSyncError::index(record_id, source)
                };
                self.ledger.mark_stale(record_id, pending, &err);
                self.ledger.persist(&[record_id]).await;
                IndexSync::Stale(err)
            }
        }
    }

    fn settle_batch(&self, batch: &BatchOperationSummary) {
        for result in &batch.results {
            let Ok(id) = result.id.parse::<RecordId>() else {
                warn!(id = %result.id, "Bulk result for unknown document id");
                continue;
            };
            self.settle_result(id, result);
        }
    }

    fn settle_result(&self, id: RecordId, result: &BatchOperationResult) {
        match &result.error {
            None if result.success => self.ledger.mark_indexed(id),
            error => {
                let source = error
                    .clone()
                    .unwrap_or_else(|| SearchError::bulk_index("document was not indexed"));
                warn!(record_id = %id, error = %source, "Document rejected during reindex");
                self.ledger.mark_stale(
                    id,
                    PendingOperation::Upsert,
                    &IndexSyncError::index(id, source),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ChannelIndexQueue;
    use crate::test_support::{EngineCall, FlakyRecordStore, MockSearchEngine};
    use crate::worker::IndexWorker;
    use post_search_repository::{InMemoryIndexStatusStore, InMemoryRecordStore, IndexStatusStore};
    use post_search_shared::{NewPost, Post, PostChanges};

    struct Fixture {
        store: Arc<FlakyRecordStore<Post>>,
        engine: Arc<MockSearchEngine>,
        repo: SyncRepository<Post>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(FlakyRecordStore::<Post>::new());
        let engine = Arc::new(MockSearchEngine::new());
        let repo = SyncRepository::new(store.clone(), engine.clone());
        Fixture {
            store,
            engine,
            repo,
        }
    }

    fn hello_world() -> Document {
        Document::new()
            .with_field("name", "Hello")
            .with_field("content", "World")
    }

    fn index_calls(engine: &MockSearchEngine) -> usize {
        engine
            .calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Index { .. } | EngineCall::Delete { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_create_indexes_document_under_record_id() {
        let f = fixture();

        let outcome = f.repo.create(NewPost::new("Hello", "World")).await.unwrap();

        assert_eq!(outcome.value.id, RecordId::new(1));
        assert_eq!(outcome.index, IndexSync::Indexed);
        assert_eq!(
            f.engine.calls(),
            vec![EngineCall::Index {
                index: "posts".to_string(),
                id: "1".to_string(),
                document: hello_world(),
            }]
        );
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Indexed);
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let f = fixture();
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();

        let outcome = f.repo.delete(RecordId::new(1)).await.unwrap();

        assert_eq!(outcome.index, IndexSync::Removed);
        assert_eq!(
            f.engine.calls().last(),
            Some(&EngineCall::Delete {
                index: "posts".to_string(),
                id: "1".to_string(),
            })
        );
        assert!(f.repo.find(RecordId::new(1)).await.unwrap().is_none());
        assert!(f.repo.indexed_document(RecordId::new(1)).await.unwrap().is_none());
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Unindexed);
    }

    #[tokio::test]
    async fn test_unreachable_engine_keeps_record() {
        let f = fixture();
        f.engine.set_unavailable(true);

        let outcome = f.repo.create(NewPost::new("Hello", "World")).await.unwrap();

        assert!(outcome.is_partial());
        assert!(matches!(
            outcome.index.warning(),
            Some(IndexSyncError::Index { .. })
        ));
        let stored = f.repo.find(outcome.value.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Hello");
        assert_eq!(f.repo.index_status(outcome.value.id), IndexStatus::Stale);
    }

    #[tokio::test]
    async fn test_failed_read_back_after_create_is_partial_success() {
        let f = fixture();
        f.store.set_fail_read_after_write(true);

        let outcome = f.repo.create(NewPost::new("Hello", "World")).await.unwrap();

        assert_eq!(outcome.value.id, RecordId::new(1));
        assert_eq!(outcome.value.name, "Hello");
        assert!(matches!(
            outcome.index.warning(),
            Some(IndexSyncError::Reload { .. })
        ));
        assert!(f.engine.calls().is_empty());
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Stale);

        f.store.set_fail_read_after_write(false);
        let report = f.repo.retry_stale().await.unwrap();

        assert_eq!(report.recovered, 1);
        assert_eq!(f.engine.document("posts", "1"), Some(hello_world()));
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Indexed);
    }

    #[tokio::test]
    async fn test_failed_read_back_after_update_is_partial_success() {
        let f = fixture();
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();
        f.store.set_fail_read_after_write(true);

        let outcome = f
            .repo
            .update(RecordId::new(1), PostChanges::new().with_content("Rust"))
            .await
            .unwrap();

        assert_eq!(outcome.value.name, "Hello");
        assert_eq!(outcome.value.content, "Rust");
        assert!(matches!(
            outcome.index.warning(),
            Some(IndexSyncError::Reload { .. })
        ));
        assert_eq!(f.engine.document("posts", "1"), Some(hello_world()));
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Stale);

        f.store.set_fail_read_after_write(false);
        f.repo.retry_stale().await.unwrap();

        let document = f.engine.document("posts", "1").unwrap();
        assert_eq!(document.get("content"), Some(&serde_json::json!("Rust")));
    }

    #[tokio::test]
    async fn test_stale_records_survive_restart() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        let engine = Arc::new(MockSearchEngine::new());
        let status_store = Arc::new(InMemoryIndexStatusStore::new());
        let open = || {
            SyncRepository::new(store.clone(), engine.clone()).with_ledger(Arc::new(
                IndexLedger::persistent(status_store.clone(), "posts"),
            ))
        };

        let first = open();
        first.create(NewPost::new("Indexed", "Fine")).await.unwrap();
        engine.set_unavailable(true);
        first.create(NewPost::new("Hello", "World")).await.unwrap();
        first.create(NewPost::new("Gone", "Soon")).await.unwrap();
        first.delete(RecordId::new(3)).await.unwrap();
        drop(first);
        engine.set_unavailable(false);

        let second = open();
        assert_eq!(second.index_status(RecordId::new(2)), IndexStatus::Unindexed);
        assert_eq!(
            second.load_index_status(RecordId::new(2)).await.unwrap(),
            IndexStatus::Stale
        );
        assert_eq!(
            second.load_index_status(RecordId::new(1)).await.unwrap(),
            IndexStatus::Indexed
        );

        let report = second.retry_stale().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.recovered, 2);
        assert_eq!(second.index_status(RecordId::new(2)), IndexStatus::Indexed);
        assert_eq!(engine.document("posts", "2"), Some(hello_world()));
        assert!(engine.document("posts", "3").is_none());
        assert!(status_store.load_all("posts").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_content_keeps_name() {
        let f = fixture();
        let created = f.repo.create(NewPost::new("Hello", "World")).await.unwrap();

        let outcome = f
            .repo
            .update(created.value.id, PostChanges::new().with_content("Rust"))
            .await
            .unwrap();

        assert_eq!(outcome.index, IndexSync::Indexed);
        let document = f.engine.document("posts", "1").unwrap();
        assert_eq!(document.get("name"), Some(&serde_json::json!("Hello")));
        assert_eq!(document.get("content"), Some(&serde_json::json!("Rust")));
    }

    #[tokio::test]
    async fn test_persistence_failure_never_touches_index() {
        let f = fixture();
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();
        f.store.set_unavailable(true);
        let calls_before = index_calls(&f.engine);

        let create = f.repo.create(NewPost::new("Other", "Post")).await;
        let update = f
            .repo
            .update(RecordId::new(1), PostChanges::new().with_name("Renamed"))
            .await;
        let delete = f.repo.delete(RecordId::new(1)).await;

        assert!(matches!(create, Err(SyncError::Persistence(_))));
        assert!(matches!(update, Err(SyncError::Persistence(_))));
        assert!(matches!(delete, Err(SyncError::Persistence(_))));
        assert_eq!(index_calls(&f.engine), calls_before);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let f = fixture();

        let update = f
            .repo
            .update(RecordId::new(9), PostChanges::new().with_name("x"))
            .await;
        let delete = f.repo.delete(RecordId::new(9)).await;

        assert!(matches!(update, Err(SyncError::NotFound(id)) if id == RecordId::new(9)));
        assert!(matches!(delete, Err(SyncError::NotFound(_))));
        assert!(f.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_is_partial_success() {
        let f = fixture();
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();
        f.engine.set_unavailable(true);

        let outcome = f.repo.delete(RecordId::new(1)).await.unwrap();

        assert!(matches!(
            outcome.index.warning(),
            Some(IndexSyncError::Delete { .. })
        ));
        assert!(f.repo.find(RecordId::new(1)).await.unwrap().is_none());
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Stale);
    }

    #[tokio::test]
    async fn test_search_uses_searchable_fields() {
        let f = fixture();
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();
        f.repo.create(NewPost::new("Other", "Post")).await.unwrap();

        let response = f.repo.search(SearchQuery::new("world")).await.unwrap();

        assert_eq!(response.ids(), vec![RecordId::new(1)]);
        let searched = f.engine.calls().into_iter().find_map(|call| match call {
            EngineCall::Search { query, .. } => Some(query),
            _ => None,
        });
        assert_eq!(
            searched.map(|query| query.fields),
            Some(vec!["name".to_string(), "content".to_string()])
        );
    }

    #[tokio::test]
    async fn test_search_errors_are_query_errors() {
        let f = fixture();

        let blank = f.repo.search(SearchQuery::new("  ")).await;
        assert!(matches!(blank, Err(SyncError::Query(QueryError::InvalidQuery(_)))));

        f.engine.set_unavailable(true);
        let failed = f.repo.search(SearchQuery::new("hello")).await;
        assert!(matches!(failed, Err(SyncError::Query(QueryError::SearchFailed(_)))));
    }

    #[tokio::test]
    async fn test_retry_recovers_stale_records() {
        let f = fixture();
        f.engine.set_unavailable(true);
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();
        f.repo.create(NewPost::new("Gone", "Soon")).await.unwrap();
        f.repo.delete(RecordId::new(2)).await.unwrap();
        f.engine.set_unavailable(false);

        let report = f.repo.retry_stale().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.recovered, 2);
        assert_eq!(f.engine.document("posts", "1"), Some(hello_world()));
        assert!(f.engine.document("posts", "2").is_none());
        assert_eq!(f.repo.index_status(RecordId::new(1)), IndexStatus::Indexed);
        assert_eq!(f.repo.index_status(RecordId::new(2)), IndexStatus::Unindexed);
        assert_eq!(f.repo.ledger().stale_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        let engine = Arc::new(MockSearchEngine::new());
        let repo = SyncRepository::new(store, engine.clone()).with_config(SyncConfig {
            max_retry_attempts: 2,
            ..Default::default()
        });
        engine.set_unavailable(true);
        repo.create(NewPost::new("Hello", "World")).await.unwrap();

        let first = repo.retry_stale().await.unwrap();
        assert_eq!(first.failed, 1);
        assert!(first.abandoned.is_empty());

        let second = repo.retry_stale().await.unwrap();
        assert_eq!(second.attempted, 0);
        assert_eq!(second.abandoned, vec![RecordId::new(1)]);
        assert_eq!(repo.index_status(RecordId::new(1)), IndexStatus::Stale);
    }

    #[tokio::test]
    async fn test_reindex_all_pages_through_store() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        for n in 0..5 {
            store
                .insert(&NewPost::new(format!("Post {}", n), "body"))
                .await
                .unwrap();
        }
        let engine = Arc::new(MockSearchEngine::new());
        engine.fail_document("4");
        let repo = SyncRepository::new(store, engine.clone()).with_config(SyncConfig {
            reindex_batch_size: 2,
            ..Default::default()
        });

        let summary = repo.reindex_all().await.unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 1);
        let bulk_calls = engine
            .calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Bulk { .. }))
            .count();
        assert_eq!(bulk_calls, 3);
        assert_eq!(repo.index_status(RecordId::new(4)), IndexStatus::Stale);
        assert_eq!(repo.index_status(RecordId::new(5)), IndexStatus::Indexed);
    }

    #[tokio::test]
    async fn test_reindex_stops_when_engine_is_down() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        store.insert(&NewPost::new("Hello", "World")).await.unwrap();
        let engine = Arc::new(MockSearchEngine::new());
        engine.set_unavailable(true);
        let repo = SyncRepository::new(store, engine);

        let result = repo.reindex_all().await;

        assert!(matches!(result, Err(SyncError::Search(_))));
        assert_eq!(repo.index_status(RecordId::new(1)), IndexStatus::Stale);
    }

    #[tokio::test]
    async fn test_ensure_index_passes_searchable_fields() {
        let f = fixture();

        f.repo.ensure_index().await.unwrap();

        assert_eq!(
            f.engine.calls(),
            vec![EngineCall::EnsureIndex {
                index: "posts".to_string(),
                fields: vec!["name".to_string(), "content".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_configured_index_name() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        let engine = Arc::new(MockSearchEngine::new());
        let repo = SyncRepository::new(store, engine.clone())
            .with_config(SyncConfig::with_index_name("posts_v2"));

        repo.create(NewPost::new("Hello", "World")).await.unwrap();

        assert_eq!(repo.index_name(), "posts_v2");
        assert!(engine.document("posts_v2", "1").is_some());
    }

    #[tokio::test]
    async fn test_deferred_mode_enqueues_and_worker_applies() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        let engine = Arc::new(MockSearchEngine::new());
        let ledger = Arc::new(IndexLedger::new());
        let (queue, receiver) = ChannelIndexQueue::channel(16);
        let repo = SyncRepository::new(store, engine.clone())
            .with_queue(Arc::new(queue))
            .with_ledger(ledger.clone());
        let worker = IndexWorker::new(receiver, engine.clone(), ledger, repo.index_name());
        let shutdown = worker.shutdown_handle();

        assert_eq!(repo.mode(), SyncMode::Deferred);

        let outcome = repo.create(NewPost::new("Hello", "World")).await.unwrap();
        assert!(matches!(outcome.index, IndexSync::Enqueued { .. }));
        assert!(engine.calls().is_empty());
        assert_eq!(repo.index_status(RecordId::new(1)), IndexStatus::Indexing);

        shutdown.send(()).unwrap();
        assert_eq!(worker.run().await, 1);

        assert_eq!(engine.document("posts", "1"), Some(hello_world()));
        assert_eq!(repo.index_status(RecordId::new(1)), IndexStatus::Indexed);
    }

    #[tokio::test]
    async fn test_full_queue_is_partial_success() {
        let store = Arc::new(InMemoryRecordStore::<Post>::new());
        let engine = Arc::new(MockSearchEngine::new());
        let (queue, _receiver) = ChannelIndexQueue::channel(1);
        let repo = SyncRepository::new(store, engine).with_queue(Arc::new(queue));

        repo.create(NewPost::new("First", "Post")).await.unwrap();
        let outcome = repo.create(NewPost::new("Second", "Post")).await.unwrap();

        assert!(matches!(
            outcome.index.warning(),
            Some(IndexSyncError::Enqueue { .. })
        ));
        assert_eq!(outcome.value.id, RecordId::new(2));
        assert_eq!(repo.index_status(RecordId::new(2)), IndexStatus::Stale);
    }

    #[tokio::test]
    async fn test_reindexing_same_document_is_idempotent() {
        let f = fixture();
        f.repo.create(NewPost::new("Hello", "World")).await.unwrap();

        f.repo.reindex_all().await.unwrap();
        f.repo.reindex_all().await.unwrap();

        assert_eq!(f.engine.document_count(), 1);
        assert_eq!(f.engine.document("posts", "1"), Some(hello_world()));
    }
}
