//! Insight (notification record) repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use stash_core::{new_v7, Error, InsightRepository, Result};

/// PostgreSQL implementation of InsightRepository.
///
/// Insights are the durable record of delivered (or attempted)
/// notifications. The pipeline only ever inserts; `mark_read` exists for
/// the consuming client.
pub struct PgInsightRepository {
    pool: Pool<Postgres>,
}

impl PgInsightRepository {
    /// Create a new PgInsightRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InsightRepository for PgInsightRepository {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
        metadata: JsonValue,
    ) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO insight (id, user_id, kind, title, body, metadata, is_read, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, false, $7)",
        )
        .bind(id)
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(&metadata)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE insight SET is_read = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM insight WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}
