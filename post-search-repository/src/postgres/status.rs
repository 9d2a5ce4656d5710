//! `IndexStatusStore` over the `index_status` table.

use async_trait::async_trait;
use deadpool_postgres::{Client, Pool};
use tokio_postgres::Row;
use tracing::{debug, instrument};

use super::map_pg_error;
use crate::errors::PersistenceError;
use crate::interfaces::IndexStatusStore;
use post_search_shared::{LedgerEntry, PendingOperation, RecordId};

const STATUS_COLUMNS: &str = "record_id, status, pending, attempts, last_error, first_failed_at";

/// PostgreSQL-backed index status store.
///
/// Shares the record store's pool; the table is created by
/// `initialize_schema`.
pub struct PostgresIndexStatusStore {
    pool: Pool,
}

impl PostgresIndexStatusStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<Client, PersistenceError> {
        self.pool
            .get()
            .await
            .map_err(|e| PersistenceError::connection(e.to_string()))
    }

    fn row_to_entry(row: &Row) -> Result<(RecordId, LedgerEntry), PersistenceError> {
        let id = RecordId::new(row.try_get("record_id").map_err(map_pg_error)?);

        let status: String = row.try_get("status").map_err(map_pg_error)?;
        let pending: Option<String> = row.try_get("pending").map_err(map_pg_error)?;
        let attempts: i32 = row.try_get("attempts").map_err(map_pg_error)?;

        let entry = LedgerEntry {
            status: status.parse().map_err(PersistenceError::query)?,
            pending: pending
                .map(|pending| pending.parse::<PendingOperation>())
                .transpose()
                .map_err(PersistenceError::query)?,
            attempts: u32::try_from(attempts).unwrap_or(0),
            last_error: row.try_get("last_error").map_err(map_pg_error)?,
            first_failed_at: row.try_get("first_failed_at").map_err(map_pg_error)?,
        };
        Ok((id, entry))
    }
}

#[async_trait]
impl IndexStatusStore for PostgresIndexStatusStore {
    #[instrument(skip(self, entry), fields(status = %entry.status))]
    async fn save(
        &self,
        index: &str,
        id: RecordId,
        entry: &LedgerEntry,
    ) -> Result<(), PersistenceError> {
        let client = self.client().await?;
        let attempts = i32::try_from(entry.attempts).unwrap_or(i32::MAX);

        client
            .execute(
                "INSERT INTO index_status
                     (index_name, record_id, status, pending, attempts, last_error, first_failed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (index_name, record_id) DO UPDATE
                 SET status = EXCLUDED.status,
                     pending = EXCLUDED.pending,
                     attempts = EXCLUDED.attempts,
                     last_error = EXCLUDED.last_error,
                     first_failed_at = EXCLUDED.first_failed_at,
                     updated_at = now()",
                &[
                    &index,
                    &id.get(),
                    &entry.status.as_str(),
                    &entry.pending.map(PendingOperation::as_str),
                    &attempts,
                    &entry.last_error,
                    &entry.first_failed_at,
                ],
            )
            .await
            .map_err(map_pg_error)?;

        debug!(record_id = %id, "Saved index status");
        Ok(())
    }

    async fn remove(&self, index: &str, ids: &[RecordId]) -> Result<(), PersistenceError> {
        if ids.is_empty() {
            return Ok(());
        }

        let client = self.client().await?;
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        client
            .execute(
                "DELETE FROM index_status WHERE index_name = $1 AND record_id = ANY($2)",
                &[&index, &ids],
            )
            .await
            .map_err(map_pg_error)?;

        Ok(())
    }

    async fn find(&self, index: &str, id: RecordId) -> Result<Option<LedgerEntry>, PersistenceError> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM index_status WHERE index_name = $1 AND record_id = $2",
                    STATUS_COLUMNS
                ),
                &[&index, &id.get()],
            )
            .await
            .map_err(map_pg_error)?;

        Ok(row
            .as_ref()
            .map(Self::row_to_entry)
            .transpose()?
            .map(|(_, entry)| entry))
    }

    async fn load_all(&self, index: &str) -> Result<Vec<(RecordId, LedgerEntry)>, PersistenceError> {
        let client = self.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM index_status WHERE index_name = $1 ORDER BY record_id",
                    STATUS_COLUMNS
                ),
                &[&index],
            )
            .await
            .map_err(map_pg_error)?;

        rows.iter().map(Self::row_to_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::{test_config, PostgresRecordStore};
    use chrono::{SubsecRound, Utc};
    use post_search_shared::IndexStatus;

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server, set PG_HOST"]
    async fn test_status_round_trip() {
        let Some(config) = test_config() else {
            return;
        };
        let records = PostgresRecordStore::connect(&config).await.unwrap();
        let store = PostgresIndexStatusStore::new(records.pool().clone());
        let index = format!("status_test_{}", std::process::id());
        let id = RecordId::new(41);

        let stale = LedgerEntry {
            status: IndexStatus::Stale,
            pending: Some(PendingOperation::Delete),
            attempts: 2,
            last_error: Some("connection refused".to_string()),
            first_failed_at: Some(Utc::now().trunc_subsecs(6)),
        };
        store.save(&index, id, &stale).await.unwrap();
        assert_eq!(store.find(&index, id).await.unwrap(), Some(stale.clone()));

        let retried = LedgerEntry {
            attempts: 3,
            ..stale
        };
        store.save(&index, id, &retried).await.unwrap();
        assert_eq!(store.load_all(&index).await.unwrap(), vec![(id, retried)]);

        store.remove(&index, &[id]).await.unwrap();
        assert!(store.find(&index, id).await.unwrap().is_none());
    }
}
