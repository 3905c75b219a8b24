//! Job queue repository implementation.
//!
//! A durable PostgreSQL-backed queue with at-least-once delivery. Claiming
//! uses `FOR UPDATE SKIP LOCKED` so each job is dispatched to exactly one
//! worker at a time; a crashed worker's job is redelivered through the
//! retry path. Delayed jobs carry a `run_at` not-before time and retry
//! rescheduling applies the kind's declared backoff policy.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use stash_core::{
    new_v7, EnqueueOptions, Error, Job, JobKind, JobPayload, JobRepository, JobStatus, QueueStats,
    Result,
};

/// PostgreSQL implementation of JobRepository.
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from database to JobStatus.
    fn str_to_status(s: &str) -> JobStatus {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        }
    }

    /// Convert JobStatus to string for database.
    #[allow(dead_code)]
    fn status_to_str(status: JobStatus) -> &'static str {
        match status {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<Job> {
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        Ok(Job {
            id: row.get("id"),
            capture_id: row.get("capture_id"),
            kind: kind.parse::<JobKind>()?,
            status: Self::str_to_status(&status),
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            attempts: row.get("attempts"),
            max_attempts: row.get("max_attempts"),
            run_at: row.get("run_at"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }

    fn resolve_enqueue(
        payload: &JobPayload,
        options: &EnqueueOptions,
        now: DateTime<Utc>,
    ) -> Result<(JobKind, i32, i32, DateTime<Utc>, JsonValue)> {
        let kind = payload.kind();
        let policy = kind.retry_policy();
        let priority = options.priority.unwrap_or_else(|| kind.default_priority());
        let max_attempts = options.max_attempts.unwrap_or(policy.max_attempts);
        let run_at = match options.delay {
            Some(delay) => {
                now + ChronoDuration::from_std(delay)
                    .map_err(|e| Error::Job(format!("Delay out of range: {e}")))?
            }
            None => now,
        };
        let payload_json = serde_json::to_value(payload)?;
        Ok((kind, priority, max_attempts, run_at, payload_json))
    }
}

const JOB_COLUMNS: &str = "id, capture_id, kind, status, priority, payload, result, \
     error_message, attempts, max_attempts, run_at, created_at, started_at, completed_at";

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn enqueue(&self, payload: &JobPayload, options: EnqueueOptions) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();
        let (kind, priority, max_attempts, run_at, payload_json) =
            Self::resolve_enqueue(payload, &options, now)?;

        sqlx::query(
            "INSERT INTO job_queue (id, capture_id, kind, status, priority, payload, attempts, max_attempts, run_at, created_at)
             VALUES ($1, $2, $3, 'pending', $4, $5, 0, $6, $7, $8)",
        )
        .bind(job_id)
        .bind(payload.capture_id())
        .bind(kind.as_str())
        .bind(priority)
        .bind(&payload_json)
        .bind(max_attempts)
        .bind(run_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(job_id)
    }

    async fn enqueue_deduplicated(
        &self,
        payload: &JobPayload,
        options: EnqueueOptions,
    ) -> Result<Option<Uuid>> {
        // Atomic check-and-insert to prevent TOCTOU races when concurrent
        // requests queue the same work. Dedup is only meaningful when the
        // payload references a capture.
        let Some(capture_id) = payload.capture_id() else {
            return self.enqueue(payload, options).await.map(Some);
        };

        let job_id = new_v7();
        let now = Utc::now();
        let (kind, priority, max_attempts, run_at, payload_json) =
            Self::resolve_enqueue(payload, &options, now)?;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO job_queue (id, capture_id, kind, status, priority, payload, attempts, max_attempts, run_at, created_at)
             SELECT $1, $2, $3, 'pending', $4, $5, 0, $6, $7, $8
             WHERE NOT EXISTS (
                 SELECT 1 FROM job_queue
                 WHERE capture_id = $2 AND kind = $3
                   AND status IN ('pending', 'running')
             )
             RETURNING id",
        )
        .bind(job_id)
        .bind(capture_id)
        .bind(kind.as_str())
        .bind(priority)
        .bind(&payload_json)
        .bind(max_attempts)
        .bind(run_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(inserted)
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>> {
        let now = Utc::now();
        let kind_strings: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();

        // Filter by kind and due time BEFORE locking; empty array = any kind.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'running', started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'
                   AND run_at <= $1
                   AND (cardinality($2::text[]) = 0 OR kind = ANY($2))
                 ORDER BY priority DESC, run_at ASC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .bind(&kind_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed', completed_at = $1, result = $2
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query("SELECT kind, attempts, max_attempts FROM job_queue WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let Some(row) = row else {
            return Err(Error::Job(format!("Cannot fail unknown job {job_id}")));
        };

        let kind: String = row.get("kind");
        let attempts: i32 = row.get("attempts");
        let max_attempts: i32 = row.get("max_attempts");
        let kind = kind.parse::<JobKind>()?;
        let consumed = attempts + 1;

        if consumed < max_attempts {
            // Attempts remain: reschedule with the kind's backoff.
            let delay = kind.retry_policy().backoff.delay_for_attempt(consumed as u32);
            let run_at = now
                + ChronoDuration::from_std(delay)
                    .map_err(|e| Error::Job(format!("Backoff out of range: {e}")))?;

            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending', attempts = $1, error_message = $2,
                     run_at = $3, started_at = NULL
                 WHERE id = $4",
            )
            .bind(consumed)
            .bind(error)
            .bind(run_at)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            // Exhausted: dead-letter for operator inspection.
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed', attempts = $1, completed_at = $2, error_message = $3
                 WHERE id = $4",
            )
            .bind(consumed)
            .bind(now)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }

    async fn list_dead_lettered(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job_queue
             WHERE status = 'failed'
             ORDER BY completed_at DESC NULLS LAST
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'running') as running,
                COUNT(*) FILTER (WHERE status = 'completed' AND completed_at > NOW() - INTERVAL '1 hour') as completed_last_hour,
                COUNT(*) FILTER (WHERE status = 'failed' AND completed_at > NOW() - INTERVAL '1 hour') as failed_last_hour,
                COUNT(*) FILTER (WHERE status = 'failed') as dead,
                COUNT(*) as total
             FROM job_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            running: row.get::<i64, _>("running"),
            completed_last_hour: row.get::<i64, _>("completed_last_hour"),
            failed_last_hour: row.get::<i64, _>("failed_last_hour"),
            dead: row.get::<i64, _>("dead"),
            total: row.get::<i64, _>("total"),
        })
    }
}
