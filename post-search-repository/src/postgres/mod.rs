//! PostgreSQL record and index status stores.

mod schema;
mod status;
mod store;

use deadpool_postgres::{Config, Pool, Runtime, SslMode};
use tokio_postgres::NoTls;
use tracing::info;

use crate::errors::PersistenceError;

pub use schema::initialize_schema;
pub use status::PostgresIndexStatusStore;
pub use store::PostgresRecordStore;

/// Connection settings for the PostgreSQL record store.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// Maximum number of connections in the pool.
    pub max_connections: usize,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "posts".to_string(),
            user: "posts".to_string(),
            password: None,
            max_connections: 10,
        }
    }
}

/// Pool settings for a config. Connections are plain TCP.
fn pool_config(config: &PostgresConfig) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();
    cfg.ssl_mode = Some(SslMode::Disable);
    cfg
}

/// Build a connection pool. No connection is opened until first use.
pub fn create_pool(config: &PostgresConfig) -> Result<Pool, PersistenceError> {
    let pool = pool_config(config)
        .builder(NoTls)
        .map_err(|e| PersistenceError::connection(format!("Failed to create pool builder: {}", e)))?
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| PersistenceError::connection(e.to_string()))?;

    info!(
        host = %config.host,
        port = config.port,
        dbname = %config.dbname,
        max_connections = config.max_connections,
        "Created PostgreSQL pool"
    );

    Ok(pool)
}

/// Map a driver error onto the persistence taxonomy.
///
/// Integrity violations (SQLSTATE class 23) are constraint errors; a closed
/// connection is a connection error; anything else is a failed query.
pub(crate) fn map_pg_error(err: tokio_postgres::Error) -> PersistenceError {
    if let Some(state) = err.code() {
        if state.code().starts_with("23") {
            return PersistenceError::constraint(err.to_string());
        }
    }
    if err.is_closed() {
        return PersistenceError::connection(err.to_string());
    }
    PersistenceError::query(err.to_string())
}

/// Connection settings for integration tests, or `None` when `PG_HOST` is
/// unset.
#[cfg(test)]
pub(crate) fn test_config() -> Option<PostgresConfig> {
    let host = std::env::var("PG_HOST").ok()?;
    let defaults = PostgresConfig::default();
    let var = |key: &str| std::env::var(key).ok();

    Some(PostgresConfig {
        host,
        port: var("PG_PORT")
            .and_then(|port| port.parse().ok())
            .unwrap_or(defaults.port),
        dbname: var("PG_DBNAME").unwrap_or(defaults.dbname),
        user: var("PG_USER").unwrap_or(defaults.user),
        password: var("PG_PASSWORD"),
        max_connections: 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PostgresConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "posts");
        assert!(config.password.is_none());
    }

    #[test]
    fn test_pool_config_matches_plain_connector() {
        let config = PostgresConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let cfg = pool_config(&config);

        assert_eq!(cfg.ssl_mode, Some(SslMode::Disable));
        assert_eq!(cfg.host.as_deref(), Some("localhost"));
        assert_eq!(cfg.password.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        let config = PostgresConfig {
            host: "unreachable.invalid".to_string(),
            ..Default::default()
        };
        assert!(create_pool(&config).is_ok());
    }
}
