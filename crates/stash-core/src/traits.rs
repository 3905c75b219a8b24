//! Core traits for stash engine abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. The pipeline is
//! written entirely against these traits; `stash-db` provides the
//! PostgreSQL implementations and tests provide in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CAPTURE REPOSITORY
// =============================================================================

/// Request for creating a new capture.
#[derive(Debug, Clone)]
pub struct CreateCaptureRequest {
    pub user_id: Uuid,
    pub content_type: ContentType,
    pub content: String,
    pub context: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// Repository for capture lifecycle operations.
///
/// Status mutations enforce the forward-only transition invariant; callers
/// cannot regress a capture through this interface.
#[async_trait]
pub trait CaptureRepository: Send + Sync {
    /// Insert a new capture in Pending status.
    async fn insert(&self, req: CreateCaptureRequest) -> Result<Uuid>;

    /// Fetch a capture by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Capture>>;

    /// Move the capture into Processing.
    ///
    /// Returns false (without touching the row) when the capture is in a
    /// terminal state, so a redelivered job can short-circuit.
    async fn mark_processing(&self, id: Uuid) -> Result<bool>;

    /// Mark processing as successfully completed.
    async fn mark_completed(&self, id: Uuid) -> Result<()>;

    /// Mark the current processing attempt as failed.
    async fn mark_failed(&self, id: Uuid) -> Result<()>;

    /// Persist a generated summary for the capture.
    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<()>;

    /// Merge keys into the capture's metadata map (keyed update, idempotent).
    async fn merge_metadata(&self, id: Uuid, patch: JsonValue) -> Result<()>;
}

// =============================================================================
// TAG & COLLECTION REPOSITORIES
// =============================================================================

/// Repository for tag operations. Writes are keyed on (capture, tag) and
/// therefore idempotent.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Attach a tag to a capture. Re-adding an existing tag is a no-op.
    async fn add_to_capture(&self, capture_id: Uuid, tag: &str, source: &str) -> Result<()>;

    /// All tags attached to a capture.
    async fn get_for_capture(&self, capture_id: Uuid) -> Result<Vec<String>>;
}

/// Repository for user-scoped collections and membership.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Fetch a collection by name, creating it if absent.
    async fn get_or_create(&self, user_id: Uuid, name: &str) -> Result<Collection>;

    /// All collections belonging to a user.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Collection>>;

    /// Add a capture to a collection. Duplicate membership is a no-op.
    async fn add_capture(&self, collection_id: Uuid, capture_id: Uuid) -> Result<()>;

    /// Capture IDs in a collection.
    async fn captures_in(&self, collection_id: Uuid) -> Result<Vec<Uuid>>;
}

// =============================================================================
// REMINDER REPOSITORY
// =============================================================================

/// Repository for scheduled reminders. Rows are unique on
/// (capture, remind_at) so a retried processing attempt cannot duplicate a
/// reminder.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Create a reminder. Returns None when an identical reminder already
    /// exists, signalling the caller to skip enqueueing its job again.
    async fn create(
        &self,
        capture_id: Uuid,
        user_id: Uuid,
        remind_at: DateTime<Utc>,
        message: &str,
    ) -> Result<Option<Reminder>>;

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>>;

    /// Record that the reminder notification went out.
    async fn mark_sent(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// INSIGHT & DEVICE REPOSITORIES
// =============================================================================

/// Repository for durable notification records.
#[async_trait]
pub trait InsightRepository: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
        metadata: JsonValue,
    ) -> Result<Uuid>;

    /// Client-side mutation; the pipeline never marks insights read.
    async fn mark_read(&self, id: Uuid) -> Result<()>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64>;
}

/// Repository for push delivery registrations.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DeviceRegistration>>;

    /// Remove a registration (e.g. after the transport reports it revoked).
    async fn remove(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// USER REPOSITORY
// =============================================================================

/// Minimal user lookup needed by the ingestion gateway.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

// =============================================================================
// JOB REPOSITORY
// =============================================================================

/// Repository for durable job queue operations.
///
/// Guarantees at-most-one-in-flight delivery per job id (claim is an atomic
/// row lock) and at-least-once delivery overall (a crashed worker's job is
/// redelivered after retry).
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a new job. The kind, default priority, and retry policy come
    /// from the typed payload.
    async fn enqueue(&self, payload: &JobPayload, options: EnqueueOptions) -> Result<Uuid>;

    /// Queue a job unless an equivalent (capture, kind) job is already
    /// pending or running. Returns None when skipped.
    async fn enqueue_deduplicated(
        &self,
        payload: &JobPayload,
        options: EnqueueOptions,
    ) -> Result<Option<Uuid>>;

    /// Claim the next due job whose kind is in `kinds` (empty = any kind).
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>>;

    /// Mark a job as completed.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Record a failed attempt: reschedules with the kind's backoff while
    /// attempts remain, otherwise dead-letters the job.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    async fn pending_count(&self) -> Result<i64>;

    /// Jobs that exhausted their attempts, newest first. Dead-lettered work
    /// is surfaced for operator inspection, never silently dropped.
    async fn list_dead_lettered(&self, limit: i64) -> Result<Vec<Job>>;

    async fn queue_stats(&self) -> Result<QueueStats>;
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// A structured-inference request: ask a model for a JSON answer to a
/// prompt. The wire format behind this is opaque to the pipeline.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    /// System instruction framing the task.
    pub system: String,
    /// User prompt including the content under analysis.
    pub prompt: String,
    /// Sampling temperature; deadline extraction uses a low value.
    pub temperature: f32,
}

/// Backend capable of producing schema-constrained JSON answers.
#[async_trait]
pub trait StructuredInference: Send + Sync {
    /// Generate a JSON value answering the request. Implementations enforce
    /// their own timeout; transport errors, timeouts, and non-JSON output
    /// surface as `Error::Inference`.
    async fn generate_structured(&self, req: StructuredRequest) -> Result<JsonValue>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate one embedding per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Expected dimension of produced vectors.
    fn dimension(&self) -> usize;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
