//! Tag repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use stash_core::{Error, Result, TagRepository};

/// PostgreSQL implementation of TagRepository.
///
/// Tag attachments are keyed on (capture_id, tag); a retried processing
/// attempt re-adding the same tag is a no-op.
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn add_to_capture(&self, capture_id: Uuid, tag: &str, source: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("Tag cannot be empty".to_string()));
        }

        sqlx::query(
            "INSERT INTO capture_tag (capture_id, tag, source, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (capture_id, tag) DO NOTHING",
        )
        .bind(capture_id)
        .bind(tag)
        .bind(source)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn get_for_capture(&self, capture_id: Uuid) -> Result<Vec<String>> {
        let tags: Vec<(String,)> = sqlx::query_as(
            "SELECT tag FROM capture_tag WHERE capture_id = $1 ORDER BY created_at ASC",
        )
        .bind(capture_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(tags.into_iter().map(|(t,)| t).collect())
    }
}
