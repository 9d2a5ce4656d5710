//! PostgreSQL schema bootstrap.

use deadpool_postgres::Client;

use crate::errors::PersistenceError;

/// Create the tables the store needs if they do not exist yet.
pub async fn initialize_schema(client: &Client) -> Result<(), PersistenceError> {
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS posts (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await
        .map_err(|e| PersistenceError::schema(format!("Failed to create posts table: {}", e)))?;

    // No foreign key: a deleted record can still owe a document removal.
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS index_status (
                index_name TEXT NOT NULL,
                record_id BIGINT NOT NULL,
                status TEXT NOT NULL,
                pending TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                first_failed_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (index_name, record_id)
            )",
        )
        .await
        .map_err(|e| PersistenceError::schema(format!("Failed to create index_status table: {}", e)))
}
