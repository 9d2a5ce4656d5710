//! Configuration for the sync repository.

use std::str::FromStr;

/// How index writes are dispatched after a successful record write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// The index write completes before the operation returns.
    #[default]
    Synchronous,
    /// The index write is handed to a queue; the operation returns once enqueued.
    Deferred,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(Self::Synchronous),
            "deferred" | "async" | "queue" => Ok(Self::Deferred),
            other => Err(format!("unknown sync mode: {}", other)),
        }
    }
}

/// Configuration for the SyncRepository.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Index to write to. `None` uses the entity type's default index.
    pub index_name: Option<String>,
    /// Number of records loaded and bulk-indexed per page when reindexing.
    pub reindex_batch_size: usize,
    /// Maximum number of stale records reconciled per retry pass.
    pub retry_batch_size: usize,
    /// Failed attempts after which a stale record is no longer retried.
    pub max_retry_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            index_name: None,
            reindex_batch_size: 500,
            retry_batch_size: 100,
            max_retry_attempts: 5,
        }
    }
}

impl SyncConfig {
    /// Create a config writing to a specific index.
    pub fn with_index_name(index_name: impl Into<String>) -> Self {
        Self {
            index_name: Some(index_name.into()),
            ..Default::default()
        }
    }
}
