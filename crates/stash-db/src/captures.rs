//! Capture repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use stash_core::{
    new_v7, Capture, CaptureRepository, CaptureStatus, ContentType, CreateCaptureRequest, Error,
    Result,
};

/// PostgreSQL implementation of CaptureRepository.
pub struct PgCaptureRepository {
    pool: Pool<Postgres>,
}

impl PgCaptureRepository {
    /// Create a new PgCaptureRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_capture_row(row: sqlx::postgres::PgRow) -> Result<Capture> {
        let content_type: String = row.get("content_type");
        let status: String = row.get("status");
        Ok(Capture {
            id: row.get("id"),
            user_id: row.get("user_id"),
            content_type: content_type.parse::<ContentType>()?,
            content: row.get("content"),
            context: row.get("context"),
            metadata: row.get("metadata"),
            status: status.parse::<CaptureStatus>()?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const CAPTURE_COLUMNS: &str =
    "id, user_id, content_type, content, context, metadata, status, created_at, updated_at";

#[async_trait]
impl CaptureRepository for PgCaptureRepository {
    async fn insert(&self, req: CreateCaptureRequest) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();
        let metadata = req.metadata.unwrap_or_else(|| serde_json::json!({}));

        sqlx::query(
            "INSERT INTO capture (id, user_id, content_type, content, context, metadata, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $7)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(req.content_type.as_str())
        .bind(&req.content)
        .bind(&req.context)
        .bind(&metadata)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Capture>> {
        let row = sqlx::query(&format!("SELECT {CAPTURE_COLUMNS} FROM capture WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_capture_row).transpose()
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        // Forward-only: a completed capture is terminal, a new attempt may
        // re-enter processing from pending/failed (or redeliver mid-run).
        let result = sqlx::query(
            "UPDATE capture SET status = 'processing', updated_at = $1
             WHERE id = $2 AND status IN ('pending', 'processing', 'failed')",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish "terminal" from "missing"
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM capture WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match exists {
            Some(_) => Ok(false),
            None => Err(Error::CaptureNotFound(id)),
        }
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE capture SET status = 'completed', updated_at = $1
             WHERE id = $2 AND status = 'processing'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE capture SET status = 'failed', updated_at = $1
             WHERE id = $2 AND status = 'processing'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<()> {
        // Keyed update: re-running the same attempt rewrites the same key.
        sqlx::query(
            "UPDATE capture
             SET metadata = jsonb_set(metadata, '{summary}', to_jsonb($1::text), true),
                 updated_at = $2
             WHERE id = $3",
        )
        .bind(summary)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn merge_metadata(&self, id: Uuid, patch: JsonValue) -> Result<()> {
        sqlx::query(
            "UPDATE capture SET metadata = metadata || $1, updated_at = $2 WHERE id = $3",
        )
        .bind(&patch)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
