//! Reminder repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use stash_core::{new_v7, Error, Reminder, ReminderRepository, Result};

/// PostgreSQL implementation of ReminderRepository.
///
/// Reminders are unique on (capture_id, remind_at): a queue redelivery that
/// replays CREATE_REMINDER hits the conflict and gets None back, so the
/// reminder-sending job is not enqueued a second time.
pub struct PgReminderRepository {
    pool: Pool<Postgres>,
}

impl PgReminderRepository {
    /// Create a new PgReminderRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_reminder_row(row: sqlx::postgres::PgRow) -> Reminder {
        Reminder {
            id: row.get("id"),
            capture_id: row.get("capture_id"),
            user_id: row.get("user_id"),
            remind_at: row.get("remind_at"),
            message: row.get("message"),
            sent_at: row.get("sent_at"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ReminderRepository for PgReminderRepository {
    async fn create(
        &self,
        capture_id: Uuid,
        user_id: Uuid,
        remind_at: DateTime<Utc>,
        message: &str,
    ) -> Result<Option<Reminder>> {
        let id = new_v7();
        let now = Utc::now();

        let row = sqlx::query(
            "INSERT INTO reminder (id, capture_id, user_id, remind_at, message, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (capture_id, remind_at) DO NOTHING
             RETURNING id, capture_id, user_id, remind_at, message, sent_at, created_at",
        )
        .bind(id)
        .bind(capture_id)
        .bind(user_id)
        .bind(remind_at)
        .bind(message)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_reminder_row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        let row = sqlx::query(
            "SELECT id, capture_id, user_id, remind_at, message, sent_at, created_at
             FROM reminder WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_reminder_row))
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE reminder SET sent_at = $1 WHERE id = $2 AND sent_at IS NULL")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
