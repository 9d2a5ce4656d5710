//! Index status of a single record.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a record's search document stands relative to the record store.
///
/// ```text
/// Unindexed -> Indexing -> Indexed
///                 |  ^        |
///                 v  |        |
///                Stale <------+ (re-index on update goes Indexed -> Indexing)
/// ```
///
/// `Stale` is recoverable and never affects the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    #[default]
    Unindexed,
    Indexing,
    Indexed,
    Stale,
}

impl IndexStatus {
    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(self, next: IndexStatus) -> bool {
        use IndexStatus::*;
        matches!(
            (self, next),
            (Unindexed, Indexing)
                | (Indexing, Indexed)
                | (Indexing, Stale)
                | (Stale, Indexing)
                | (Indexed, Indexing)
        )
    }

    /// Move to `next`, or `None` if the transition is not allowed.
    pub fn transition_to(self, next: IndexStatus) -> Option<IndexStatus> {
        self.can_transition_to(next).then_some(next)
    }

    pub fn needs_retry(self) -> bool {
        self == IndexStatus::Stale
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexStatus::Unindexed => "unindexed",
            IndexStatus::Indexing => "indexing",
            IndexStatus::Indexed => "indexed",
            IndexStatus::Stale => "stale",
        }
    }
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unindexed" => Ok(IndexStatus::Unindexed),
            "indexing" => Ok(IndexStatus::Indexing),
            "indexed" => Ok(IndexStatus::Indexed),
            "stale" => Ok(IndexStatus::Stale),
            other => Err(format!("unknown index status: {}", other)),
        }
    }
}

/// The index-side operation a record is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperation {
    Upsert,
    Delete,
}

impl PendingOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            PendingOperation::Upsert => "upsert",
            PendingOperation::Delete => "delete",
        }
    }
}

impl FromStr for PendingOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upsert" => Ok(PendingOperation::Upsert),
            "delete" => Ok(PendingOperation::Delete),
            other => Err(format!("unknown pending operation: {}", other)),
        }
    }
}

/// Index state of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub status: IndexStatus,
    /// Operation in flight, or the one that failed.
    pub pending: Option<PendingOperation>,
    /// Failed attempts since the record was last consistent.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub first_failed_at: Option<DateTime<Utc>>,
}

impl Default for LedgerEntry {
    fn default() -> Self {
        Self {
            status: IndexStatus::Unindexed,
            pending: None,
            attempts: 0,
            last_error: None,
            first_failed_at: None,
        }
    }
}
