//! Webhook ingestion gateway.
//!
//! The HTTP surface lives outside this crate; this gateway is the
//! function-level contract it calls into: validate the user, create a
//! pending capture, and enqueue its processing job.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use stash_core::{
    CaptureRepository, ContentType, CreateCaptureRequest, EnqueueOptions, Error, JobPayload,
    JobRepository, Result, UserRepository,
};

/// An inbound webhook capture request.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookIngest {
    #[serde(default)]
    pub source: Option<String>,
    pub content: String,
    /// Defaults to text when the caller does not specify a type.
    #[serde(default, rename = "type")]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

/// Ingestion gateway: turns validated webhook payloads into pending
/// captures with a queued processing job.
pub struct IngestionGateway {
    users: Arc<dyn UserRepository>,
    captures: Arc<dyn CaptureRepository>,
    jobs: Arc<dyn JobRepository>,
}

impl IngestionGateway {
    pub fn new(
        users: Arc<dyn UserRepository>,
        captures: Arc<dyn CaptureRepository>,
        jobs: Arc<dyn JobRepository>,
    ) -> Self {
        Self {
            users,
            captures,
            jobs,
        }
    }

    /// Ingest a webhook payload on behalf of `user_id`.
    ///
    /// An identifier that does not resolve to a known user is rejected
    /// (the HTTP layer maps [`Error::UserNotFound`] to a 4xx). On success
    /// the new capture's id is returned and a deduplicated
    /// capture-processing job is queued.
    pub async fn ingest_webhook(&self, user_id: Uuid, req: WebhookIngest) -> Result<Uuid> {
        if req.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Webhook content cannot be empty".to_string(),
            ));
        }

        if !self.users.exists(user_id).await? {
            return Err(Error::UserNotFound(user_id));
        }

        let content_type = req.content_type.unwrap_or(ContentType::Text);

        let mut metadata = match req.metadata {
            Some(JsonValue::Object(map)) => JsonValue::Object(map),
            _ => serde_json::json!({}),
        };
        if let Some(source) = &req.source {
            metadata["source"] = serde_json::json!(source);
        }

        let capture_id = self
            .captures
            .insert(CreateCaptureRequest {
                user_id,
                content_type,
                content: req.content,
                context: None,
                metadata: Some(metadata),
            })
            .await?;

        self.jobs
            .enqueue_deduplicated(
                &JobPayload::CaptureProcessing {
                    capture_id,
                    user_id,
                },
                EnqueueOptions::default(),
            )
            .await?;

        info!(
            subsystem = "ingest",
            capture_id = %capture_id,
            user_id = %user_id,
            content_type = content_type.as_str(),
            "Webhook capture accepted"
        );

        Ok(capture_id)
    }
}
