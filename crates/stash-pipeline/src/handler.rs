//! Job handler contract for the worker runtime.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stash_core::{Job, JobKind, JobPayload, Result};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// The capture this job references, if any.
    pub fn capture_id(&self) -> Option<Uuid> {
        self.job.capture_id
    }

    /// Decode the typed payload for this job.
    ///
    /// A payload that fails to decode is a validation failure for this
    /// attempt; the handler surfaces it to the queue rather than guessing.
    pub fn typed_payload(&self) -> Result<JobPayload> {
        self.job.typed_payload()
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed; the queue applies the kind's retry policy.
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn kind(&self) -> JobKind;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// No-op handler for testing the worker runtime.
pub struct NoOpHandler {
    kind: JobKind,
}

impl NoOpHandler {
    /// Create a new no-op handler for the given job kind.
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Success(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job_with_payload(payload: JsonValue) -> Job {
        Job {
            id: Uuid::new_v4(),
            capture_id: None,
            kind: JobKind::CaptureProcessing,
            status: stash_core::JobStatus::Pending,
            priority: 0,
            payload,
            result: None,
            error_message: None,
            attempts: 0,
            max_attempts: 3,
            run_at: Utc::now(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_typed_payload_decodes() {
        let capture_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let job = job_with_payload(serde_json::json!({
            "kind": "capture-processing",
            "capture_id": capture_id,
            "user_id": user_id,
        }));

        let ctx = JobContext::new(job);
        match ctx.typed_payload().unwrap() {
            JobPayload::CaptureProcessing {
                capture_id: c,
                user_id: u,
            } => {
                assert_eq!(c, capture_id);
                assert_eq!(u, user_id);
            }
            other => panic!("Wrong payload variant: {other:?}"),
        }
    }

    #[test]
    fn test_typed_payload_malformed_is_error() {
        let job = job_with_payload(serde_json::json!({"kind": "capture-processing"}));
        let ctx = JobContext::new(job);
        assert!(ctx.typed_payload().is_err());
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler::new(JobKind::PatternLearning);
        assert_eq!(handler.kind(), JobKind::PatternLearning);

        let ctx = JobContext::new(job_with_payload(serde_json::json!({
            "kind": "pattern-learning",
            "user_id": Uuid::new_v4(),
        })));
        let result = handler.execute(ctx).await;
        assert!(matches!(result, JobResult::Success(None)));
    }
}
