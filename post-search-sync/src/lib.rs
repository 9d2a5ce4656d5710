//! # Post Search Sync
//!
//! This crate keeps a search index eventually consistent with an
//! authoritative record store.
//!
//! ## Architecture
//!
//! 1. **SyncRepository**: writes to the record store first, then mirrors the
//!    derived document into the index
//! 2. **IndexLedger**: tracks each record's index status and pending retries
//! 3. **IndexQueue**: optional deferred dispatch of index jobs
//! 4. **IndexWorker**: drains the queue and applies jobs to the search engine
//!
//! Index-side failures never undo a committed record write. They are
//! reported as partial successes and left for `retry_stale` to reconcile.

pub mod config;
pub mod errors;
pub mod ledger;
pub mod outcome;
pub mod queue;
pub mod repository;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::{SyncConfig, SyncMode};
pub use errors::SyncError;
pub use ledger::{IndexLedger, LedgerEntry, PendingOperation};
pub use outcome::{IndexSync, RetryReport, SyncOutcome};
pub use queue::{ChannelIndexQueue, IndexJob, IndexOperation, IndexQueue};
pub use repository::SyncRepository;
pub use worker::IndexWorker;
