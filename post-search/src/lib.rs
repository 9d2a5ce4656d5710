//! # Post Search
//!
//! Entry point and configuration for the post search service.
//!
//! Posts live in a record store (PostgreSQL, or memory for local runs) and
//! are mirrored into an OpenSearch index through the sync repository.

pub mod config;
pub mod telemetry;

pub use config::{Dependencies, LogFormat, RecordStoreBackend, Settings};

use thiserror::Error;

/// Errors that can occur during startup or while running a command.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Sync repository error.
    #[error("Sync error: {0}")]
    SyncError(#[from] post_search_sync::SyncError),

    /// Record store error.
    #[error("Persistence error: {0}")]
    PersistenceError(#[from] post_search_repository::PersistenceError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] post_search_repository::SearchError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
