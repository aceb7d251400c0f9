//! Repository for the `prompt_history` table.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::RepositoryError;
use crate::history::{effective_limit, HistoryRecord, HistoryRepository};
use crate::identity::Identity;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, owner, prompt, style, image, image_url, created_at, generation_time, model_used";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS prompt_history (
    id UUID PRIMARY KEY,
    owner TEXT NULL,
    prompt TEXT NOT NULL,
    style VARCHAR(100) NOT NULL DEFAULT 'realistic',
    image TEXT NOT NULL,
    image_url TEXT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    generation_time DOUBLE PRECISION NULL,
    model_used VARCHAR(100) NOT NULL DEFAULT 'stable-diffusion'
)";

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS prompt_history_owner_created_idx
    ON prompt_history (owner, created_at DESC)";

fn insert_query() -> String {
    format!(
        "INSERT INTO prompt_history
            (id, owner, prompt, style, image, image_url, created_at, generation_time, model_used)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {COLUMNS}"
    )
}

fn owned_query() -> String {
    format!(
        "SELECT {COLUMNS} FROM prompt_history
         WHERE owner = $1
         ORDER BY created_at DESC
         LIMIT $2"
    )
}

fn ownerless_query() -> String {
    format!(
        "SELECT {COLUMNS} FROM prompt_history
         WHERE owner IS NULL
         ORDER BY created_at DESC
         LIMIT $1"
    )
}

/// History records stored in Postgres
pub struct PgHistoryRepository {
    pool: PgPool,
}

impl PgHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the table and index if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        info!("prompt_history schema ready");
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn create(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        let row = sqlx::query_as::<_, HistoryRecord>(&insert_query())
            .bind(record.id)
            .bind(&record.owner)
            .bind(&record.prompt)
            .bind(&record.style)
            .bind(&record.image)
            .bind(&record.image_url)
            .bind(record.created_at)
            .bind(record.generation_time)
            .bind(&record.model_used)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let limit = effective_limit(identity, limit) as i64;
        let rows = match identity.user_id() {
            Some(owner) => {
                sqlx::query_as::<_, HistoryRecord>(&owned_query())
                    .bind(owner)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, HistoryRecord>(&ownerless_query())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompt_history")
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|_| RepositoryError::Corrupt(format!("negative count {}", count)))
    }
}
