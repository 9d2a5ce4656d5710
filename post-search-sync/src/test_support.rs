//! Mock collaborators shared by the unit tests of this crate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use post_search_repository::{
    BatchOperationResult, BatchOperationSummary, InMemoryRecordStore, IndexRequest,
    PersistenceError, RecordStore, SearchEngineClient, SearchError,
};
use post_search_shared::{Document, Entity, RecordId, SearchHit, SearchQuery, SearchResponse};

/// A call received by the mock engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Index {
        index: String,
        id: String,
        document: Document,
    },
    Delete {
        index: String,
        id: String,
    },
    Bulk {
        index: String,
        count: usize,
    },
    Search {
        index: String,
        query: SearchQuery,
    },
    EnsureIndex {
        index: String,
        fields: Vec<String>,
    },
}

/// In-memory search engine recording every call.
#[derive(Default)]
pub struct MockSearchEngine {
    documents: Mutex<BTreeMap<(String, String), Document>>,
    calls: Mutex<Vec<EngineCall>>,
    unavailable: AtomicBool,
    failing_ids: Mutex<Vec<String>>,
}

impl MockSearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make writes of one document id fail.
    pub fn fail_document(&self, id: &str) {
        self.failing_ids.lock().push(id.to_string());
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Document> {
        self.documents
            .lock()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().len()
    }

    fn check_available(&self) -> Result<(), SearchError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SearchError::connection("connection refused"));
        }
        Ok(())
    }

    fn write(&self, index: &str, id: &str, document: &Document) -> Result<(), SearchError> {
        if self.failing_ids.lock().iter().any(|failing| failing == id) {
            return Err(SearchError::index(format!("rejected document {}", id)));
        }
        self.documents
            .lock()
            .insert((index.to_string(), id.to_string()), document.clone());
        Ok(())
    }
}

#[async_trait]
impl SearchEngineClient for MockSearchEngine {
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), SearchError> {
        self.calls.lock().push(EngineCall::Index {
            index: index.to_string(),
            id: id.to_string(),
            document: document.clone(),
        });
        self.check_available()?;
        self.write(index, id, document)
    }

    async fn bulk_index_documents(
        &self,
        index: &str,
        requests: &[IndexRequest],
    ) -> Result<BatchOperationSummary, SearchError> {
        self.calls.lock().push(EngineCall::Bulk {
            index: index.to_string(),
            count: requests.len(),
        });
        self.check_available()?;

        let results = requests
            .iter()
            .map(|request| match self.write(index, &request.id, &request.document) {
                Ok(()) => BatchOperationResult::succeeded(request.id.clone()),
                Err(e) => BatchOperationResult::failed(request.id.clone(), e),
            })
            .collect();
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchError> {
        self.calls.lock().push(EngineCall::Delete {
            index: index.to_string(),
            id: id.to_string(),
        });
        self.check_available()?;
        self.documents
            .lock()
            .remove(&(index.to_string(), id.to_string()));
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>, SearchError> {
        self.check_available()?;
        Ok(self.document(index, id))
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        self.calls.lock().push(EngineCall::Search {
            index: index.to_string(),
            query: query.clone(),
        });
        self.check_available()?;

        let needle = query.query.to_lowercase();
        let hits: Vec<SearchHit> = self
            .documents
            .lock()
            .iter()
            .filter(|((doc_index, _), _)| doc_index == index)
            .filter(|(_, document)| {
                query.fields.iter().any(|field| {
                    document
                        .get(field)
                        .and_then(|value| value.as_str())
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            })
            .filter_map(|((_, id), _)| id.parse().ok())
            .map(|id: RecordId| SearchHit {
                id,
                score: 1.0,
                snippet: None,
            })
            .collect();

        Ok(SearchResponse {
            total: hits.len() as u64,
            hits,
            took_ms: 1,
        })
    }

    async fn ensure_index_exists(&self, index: &str, fields: &[&str]) -> Result<(), SearchError> {
        self.calls.lock().push(EngineCall::EnsureIndex {
            index: index.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self.check_available()
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}

/// Record store that can be switched into an outage.
pub struct FlakyRecordStore<E: Entity> {
    inner: InMemoryRecordStore<E>,
    unavailable: AtomicBool,
    fail_read_after_write: AtomicBool,
    read_poisoned: AtomicBool,
}

impl<E: Entity> FlakyRecordStore<E> {
    pub fn new() -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            unavailable: AtomicBool::new(false),
            fail_read_after_write: AtomicBool::new(false),
            read_poisoned: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the first read after each committed write fail.
    pub fn set_fail_read_after_write(&self, fail: bool) {
        self.fail_read_after_write.store(fail, Ordering::SeqCst);
        if !fail {
            self.read_poisoned.store(false, Ordering::SeqCst);
        }
    }

    fn wrote(&self) {
        if self.fail_read_after_write.load(Ordering::SeqCst) {
            self.read_poisoned.store(true, Ordering::SeqCst);
        }
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::connection("database is down"));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> RecordStore<E> for FlakyRecordStore<E> {
    async fn insert(&self, attributes: &E::NewAttributes) -> Result<RecordId, PersistenceError> {
        self.check_available()?;
        let id = self.inner.insert(attributes).await?;
        self.wrote();
        Ok(id)
    }

    async fn update(&self, id: RecordId, changes: &E::Changes) -> Result<bool, PersistenceError> {
        self.check_available()?;
        let updated = self.inner.update(id, changes).await?;
        if updated {
            self.wrote();
        }
        Ok(updated)
    }

    async fn delete(&self, id: RecordId) -> Result<bool, PersistenceError> {
        self.check_available()?;
        self.inner.delete(id).await
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<E>, PersistenceError> {
        self.check_available()?;
        if self.read_poisoned.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::connection("connection reset after commit"));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<E>, PersistenceError> {
        self.check_available()?;
        self.inner.find_page(after, limit).await
    }
}
