//! # Post Search Repository
//!
//! This crate provides the interfaces the sync layer talks to: the record
//! store holding authoritative entity state and the search engine client
//! holding derived documents, plus the store that keeps per-record index
//! status across runs. It also ships concrete implementations for
//! OpenSearch, PostgreSQL and in-memory stores.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use config::{RefreshPolicy, SearchEngineConfig};
pub use errors::{IndexSyncError, PersistenceError, QueryError, SearchError};
pub use interfaces::{IndexStatusStore, RecordStore, SearchEngineClient};
pub use memory::{InMemoryIndexStatusStore, InMemoryRecordStore};
pub use opensearch::OpenSearchClient;
pub use postgres::{PostgresConfig, PostgresIndexStatusStore, PostgresRecordStore};
pub use types::{BatchOperationResult, BatchOperationSummary, IndexRequest};
