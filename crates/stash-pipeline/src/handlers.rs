//! Concrete job handlers: closed dispatch over typed payloads.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use stash_core::{JobKind, JobPayload, NotificationPayload, ReminderRepository};

use crate::executor::Coordinator;
use crate::handler::{JobContext, JobHandler, JobResult};
use crate::notify::NotificationDispatcher;

/// Handler for capture-processing jobs.
///
/// Drives the coordinator; errors propagate to the queue so its retry
/// policy (bounded attempts, exponential backoff) engages.
pub struct CaptureProcessingHandler {
    coordinator: Arc<Coordinator>,
}

impl CaptureProcessingHandler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl JobHandler for CaptureProcessingHandler {
    fn kind(&self) -> JobKind {
        JobKind::CaptureProcessing
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload = match ctx.typed_payload() {
            Ok(payload) => payload,
            // Malformed payload is a validation failure for this attempt
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        let (capture_id, user_id) = match payload {
            JobPayload::CaptureProcessing {
                capture_id,
                user_id,
            } => (capture_id, user_id),
            other => {
                return JobResult::Failed(format!(
                    "Wrong payload kind for capture-processing job: {}",
                    other.kind().as_str()
                ))
            }
        };

        match self.coordinator.process_capture(capture_id, user_id).await {
            Ok(()) => JobResult::Success(Some(serde_json::json!({
                "capture_id": capture_id,
            }))),
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

/// Handler for reminder-sending jobs.
///
/// Loads the reminder, dispatches the notification, and marks it sent.
/// An already-sent reminder is a no-op success so queue redelivery cannot
/// notify twice.
pub struct ReminderSendingHandler {
    reminders: Arc<dyn ReminderRepository>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ReminderSendingHandler {
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            reminders,
            dispatcher,
        }
    }
}

#[async_trait]
impl JobHandler for ReminderSendingHandler {
    fn kind(&self) -> JobKind {
        JobKind::ReminderSending
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload = match ctx.typed_payload() {
            Ok(payload) => payload,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        let reminder_id = match payload {
            JobPayload::ReminderSending { reminder_id } => reminder_id,
            other => {
                return JobResult::Failed(format!(
                    "Wrong payload kind for reminder-sending job: {}",
                    other.kind().as_str()
                ))
            }
        };

        let reminder = match self.reminders.get(reminder_id).await {
            Ok(Some(reminder)) => reminder,
            Ok(None) => {
                return JobResult::Failed(format!("Unknown reminder: {reminder_id}"));
            }
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        if reminder.sent_at.is_some() {
            info!(
                reminder_id = %reminder_id,
                "Reminder already sent, skipping redelivered job"
            );
            return JobResult::Success(None);
        }

        let payload = NotificationPayload {
            title: "Reminder".to_string(),
            body: reminder.message.clone(),
            action: Some("open_capture".to_string()),
            data: Some(serde_json::json!({ "capture_id": reminder.capture_id })),
            priority: Some(8),
        };

        match self.dispatcher.send(reminder.user_id, &payload).await {
            Ok(result) if result.success => {
                if let Err(e) = self.reminders.mark_sent(reminder_id).await {
                    return JobResult::Failed(e.to_string());
                }
                JobResult::Success(Some(serde_json::json!({
                    "reminder_id": reminder_id,
                    "message_id": result.message_id,
                })))
            }
            Ok(result) => {
                // Undelivered without an exception; reminders are
                // time-sensitive and cheap to repeat, so let the queue retry
                warn!(
                    reminder_id = %reminder_id,
                    reason = result.reason.as_deref().unwrap_or(""),
                    "Reminder not delivered"
                );
                JobResult::Failed(format!(
                    "Reminder not delivered: {}",
                    result.reason.unwrap_or_else(|| "unknown".to_string())
                ))
            }
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}
