//! Collection repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use stash_core::{new_v7, Collection, CollectionRepository, Error, Result};

/// PostgreSQL implementation of CollectionRepository.
pub struct PgCollectionRepository {
    pool: Pool<Postgres>,
}

impl PgCollectionRepository {
    /// Create a new PgCollectionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionRepository for PgCollectionRepository {
    async fn get_or_create(&self, user_id: Uuid, name: &str) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Collection name cannot be empty".to_string(),
            ));
        }

        let id = new_v7();
        let now = Utc::now();

        // Atomic get-or-create; the no-op DO UPDATE makes RETURNING yield
        // the existing row on conflict.
        let row = sqlx::query(
            "INSERT INTO collection (id, user_id, name, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id, user_id, name, created_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Collection {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        })
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, created_at FROM collection
             WHERE user_id = $1
             ORDER BY name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Collection {
                id: row.get("id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn add_capture(&self, collection_id: Uuid, capture_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO capture_collection (collection_id, capture_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (collection_id, capture_id) DO NOTHING",
        )
        .bind(collection_id)
        .bind(capture_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn captures_in(&self, collection_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT capture_id FROM capture_collection
             WHERE collection_id = $1
             ORDER BY created_at ASC",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
