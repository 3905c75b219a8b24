//! # stash-db
//!
//! PostgreSQL persistence layer for the stash engine.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for captures, tags, collections, reminders,
//!   insights, device registrations, and users
//! - The durable job queue (`FOR UPDATE SKIP LOCKED` claiming, delayed jobs,
//!   per-kind retry backoff, dead-lettering)
//!
//! The schema is documented in `migrations/0001_init.sql` at the workspace
//! root.
//!
//! ## Example
//!
//! ```rust,ignore
//! use stash_db::Database;
//! use stash_core::{CreateCaptureRequest, ContentType};
//!
//! let db = Database::connect("postgres://localhost/stash").await?;
//! let id = db.captures.insert(CreateCaptureRequest {
//!     user_id,
//!     content_type: ContentType::Link,
//!     content: "https://example.com/article".to_string(),
//!     context: None,
//!     metadata: None,
//! }).await?;
//! ```

pub mod captures;
pub mod collections;
pub mod devices;
pub mod insights;
pub mod jobs;
pub mod pool;
pub mod reminders;
pub mod tags;
pub mod users;

// Re-export core types
pub use stash_core::*;

// Re-export repository implementations
pub use captures::PgCaptureRepository;
pub use collections::PgCollectionRepository;
pub use devices::PgDeviceRepository;
pub use insights::PgInsightRepository;
pub use jobs::PgJobRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use reminders::PgReminderRepository;
pub use tags::PgTagRepository;
pub use users::PgUserRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Capture repository for lifecycle operations.
    pub captures: PgCaptureRepository,
    /// Tag repository.
    pub tags: PgTagRepository,
    /// Collection repository.
    pub collections: PgCollectionRepository,
    /// Reminder repository.
    pub reminders: PgReminderRepository,
    /// Insight (notification record) repository.
    pub insights: PgInsightRepository,
    /// Push device registration repository.
    pub devices: PgDeviceRepository,
    /// User lookup repository.
    pub users: PgUserRepository,
    /// Job queue repository.
    pub jobs: PgJobRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            captures: PgCaptureRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            collections: PgCollectionRepository::new(pool.clone()),
            reminders: PgReminderRepository::new(pool.clone()),
            insights: PgInsightRepository::new(pool.clone()),
            devices: PgDeviceRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
