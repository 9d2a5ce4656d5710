//! Configuration for the post search service.
//!
//! Settings come from environment variables. A `.env` file in the working
//! directory is loaded first when present.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::str::FromStr;

use crate::AppError;
use post_search_repository::{PostgresConfig, RefreshPolicy, SearchEngineConfig};
use post_search_shared::POSTS_INDEX;
use post_search_sync::SyncMode;

/// Default capacity of the deferred index queue.
const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default number of failed attempts before a stale record is abandoned.
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

/// Where records are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordStoreBackend {
    #[default]
    Postgres,
    /// Process-local store, for development. Records are lost on exit.
    Memory,
}

impl FromStr for RecordStoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown record store: {}", other)),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Service settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub search: SearchEngineConfig,
    pub index_name: String,
    pub sync_mode: SyncMode,
    pub queue_capacity: usize,
    pub max_retry_attempts: u32,
    pub record_store: RecordStoreBackend,
    pub postgres: PostgresConfig,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search: SearchEngineConfig::default(),
            index_name: POSTS_INDEX.to_string(),
            sync_mode: SyncMode::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            record_store: RecordStoreBackend::default(),
            postgres: PostgresConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_HOSTS`: comma-separated OpenSearch URLs (default: http://localhost:9200)
    /// - `SEARCH_INDEX`: index name (default: posts)
    /// - `SEARCH_REFRESH`: `none`, `wait_for` or `true` (default: none)
    /// - `SYNC_MODE`: `sync` or `deferred` (default: sync)
    /// - `SYNC_QUEUE_CAPACITY`: deferred queue capacity (default: 1000)
    /// - `SYNC_MAX_RETRY_ATTEMPTS`: attempts before a stale record is abandoned (default: 5)
    /// - `RECORD_STORE`: `postgres` or `memory` (default: postgres)
    /// - `PG_HOST`, `PG_PORT`, `PG_DBNAME`, `PG_USER`, `PG_PASSWORD`, `PG_MAX_CONNECTIONS`
    /// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let hosts = match get("SEARCH_HOSTS") {
            Some(raw) => {
                let hosts = SearchEngineConfig::parse_hosts(&raw);
                if hosts.is_empty() {
                    return Err(AppError::config("SEARCH_HOSTS lists no hosts"));
                }
                hosts
            }
            None => defaults.search.hosts.clone(),
        };

        let search = SearchEngineConfig {
            hosts,
            refresh: parse_or(get("SEARCH_REFRESH"), "SEARCH_REFRESH", RefreshPolicy::None)?,
            ..defaults.search
        };

        let postgres = PostgresConfig {
            host: get("PG_HOST").unwrap_or(defaults.postgres.host),
            port: parse_or(get("PG_PORT"), "PG_PORT", defaults.postgres.port)?,
            dbname: get("PG_DBNAME").unwrap_or(defaults.postgres.dbname),
            user: get("PG_USER").unwrap_or(defaults.postgres.user),
            password: get("PG_PASSWORD"),
            max_connections: parse_or(
                get("PG_MAX_CONNECTIONS"),
                "PG_MAX_CONNECTIONS",
                defaults.postgres.max_connections,
            )?,
        };

        let queue_capacity = parse_or(
            get("SYNC_QUEUE_CAPACITY"),
            "SYNC_QUEUE_CAPACITY",
            defaults.queue_capacity,
        )?;
        if queue_capacity == 0 {
            return Err(AppError::config("SYNC_QUEUE_CAPACITY must be at least 1"));
        }

        Ok(Self {
            search,
            index_name: get("SEARCH_INDEX").unwrap_or(defaults.index_name),
            sync_mode: parse_or(get("SYNC_MODE"), "SYNC_MODE", defaults.sync_mode)?,
            queue_capacity,
            max_retry_attempts: parse_or(
                get("SYNC_MAX_RETRY_ATTEMPTS"),
                "SYNC_MAX_RETRY_ATTEMPTS",
                defaults.max_retry_attempts,
            )?,
            record_store: parse_or(get("RECORD_STORE"), "RECORD_STORE", defaults.record_store)?,
            postgres,
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", defaults.log_format)?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("invalid {}={}: {}", key, raw, e))),
        None => Ok(default),
    }
}
