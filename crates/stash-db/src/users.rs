//! User repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use stash_core::{Error, Result, UserRepository};

/// PostgreSQL implementation of UserRepository.
///
/// Authentication lives outside this system; the pipeline only needs to
/// resolve caller-supplied identifiers to known users.
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM app_user WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(found.is_some())
    }
}
