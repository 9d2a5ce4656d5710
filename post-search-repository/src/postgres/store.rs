//! `RecordStore<Post>` over a PostgreSQL connection pool.

use async_trait::async_trait;
use deadpool_postgres::{Client, Pool};
use tokio_postgres::Row;
use tracing::{debug, info, instrument};

use super::{create_pool, initialize_schema, map_pg_error, PostgresConfig};
use crate::errors::PersistenceError;
use crate::interfaces::RecordStore;
use post_search_shared::{NewPost, Post, PostChanges, RecordId};

const POST_COLUMNS: &str = "id, name, content, created_at, updated_at";

/// PostgreSQL-backed record store for posts.
pub struct PostgresRecordStore {
    pool: Pool,
}

impl PostgresRecordStore {
    /// Wrap an existing pool. The schema is assumed to exist.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a pool, verify connectivity and bootstrap the schema.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PersistenceError> {
        let store = Self::new(create_pool(config)?);

        let client = store.client().await?;
        initialize_schema(&client).await?;
        drop(client);

        info!("PostgreSQL record store ready");
        Ok(store)
    }

    /// The underlying pool, for stores sharing the same database.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn client(&self) -> Result<Client, PersistenceError> {
        self.pool
            .get()
            .await
            .map_err(|e| PersistenceError::connection(e.to_string()))
    }

    fn row_to_post(row: &Row) -> Result<Post, PersistenceError> {
        Ok(Post {
            id: RecordId::new(row.try_get("id").map_err(map_pg_error)?),
            name: row.try_get("name").map_err(map_pg_error)?,
            content: row.try_get("content").map_err(map_pg_error)?,
            created_at: row.try_get("created_at").map_err(map_pg_error)?,
            updated_at: row.try_get("updated_at").map_err(map_pg_error)?,
        })
    }
}

#[async_trait]
impl RecordStore<Post> for PostgresRecordStore {
    #[instrument(skip(self, attributes))]
    async fn insert(&self, attributes: &NewPost) -> Result<RecordId, PersistenceError> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO posts (name, content) VALUES ($1, $2) RETURNING id",
                &[&attributes.name, &attributes.content],
            )
            .await
            .map_err(map_pg_error)?;

        let id = RecordId::new(row.try_get(0).map_err(map_pg_error)?);
        debug!(record_id = %id, "Inserted post");
        Ok(id)
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: RecordId, changes: &PostChanges) -> Result<bool, PersistenceError> {
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE posts
                 SET name = COALESCE($2, name),
                     content = COALESCE($3, content),
                     updated_at = now()
                 WHERE id = $1",
                &[&id.get(), &changes.name, &changes.content],
            )
            .await
            .map_err(map_pg_error)?;

        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: RecordId) -> Result<bool, PersistenceError> {
        let client = self.client().await?;
        let deleted = client
            .execute("DELETE FROM posts WHERE id = $1", &[&id.get()])
            .await
            .map_err(map_pg_error)?;

        Ok(deleted > 0)
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<Post>, PersistenceError> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS),
                &[&id.get()],
            )
            .await
            .map_err(map_pg_error)?;

        row.as_ref().map(Self::row_to_post).transpose()
    }

    async fn find_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<Post>, PersistenceError> {
        let client = self.client().await?;
        let after = after.map(RecordId::get).unwrap_or(0);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM posts WHERE id > $1 ORDER BY id LIMIT $2",
                    POST_COLUMNS
                ),
                &[&after, &limit],
            )
            .await
            .map_err(map_pg_error)?;

        rows.iter().map(Self::row_to_post).collect()
    }
}
