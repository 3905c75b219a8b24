//! Device registration repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use stash_core::{DeviceRegistration, DeviceRepository, Error, Result};

/// PostgreSQL implementation of DeviceRepository.
pub struct PgDeviceRepository {
    pool: Pool<Postgres>,
}

impl PgDeviceRepository {
    /// Create a new PgDeviceRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DeviceRegistration>> {
        let rows = sqlx::query(
            "SELECT id, user_id, token, platform, created_at
             FROM device_registration
             WHERE user_id = $1
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| DeviceRegistration {
                id: row.get("id"),
                user_id: row.get("user_id"),
                token: row.get("token"),
                platform: row.get("platform"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM device_registration WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
