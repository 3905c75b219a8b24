//! Coordinator: drives the full per-capture processing sequence and applies
//! the resulting action plan.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use stash_core::{
    delay_until, Action, ActionType, Capture, CaptureRepository, CollectionRepository,
    DeepAnalysis, EnqueueOptions, Error, JobPayload, JobRepository, NotificationPayload,
    ReminderRepository, Result, TagRepository,
};

use crate::collection_match::CollectionMatcher;
use crate::deadline::DeadlineExtractor;
use crate::extractors::ExtractorRegistry;
use crate::notify::NotificationDispatcher;
use crate::planner::Planner;

/// Everything the coordinator needs, constructed once at startup and
/// injected (no module-level singletons).
pub struct CoordinatorDeps {
    pub captures: Arc<dyn CaptureRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub collections: Arc<dyn CollectionRepository>,
    pub reminders: Arc<dyn ReminderRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub matcher: Arc<CollectionMatcher>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub extractors: Arc<ExtractorRegistry>,
    pub deadline: Arc<DeadlineExtractor>,
    pub planner: Arc<Planner>,
}

/// Coordinator for capture processing.
pub struct Coordinator {
    deps: CoordinatorDeps,
}

impl Coordinator {
    pub fn new(deps: CoordinatorDeps) -> Self {
        Self { deps }
    }

    /// Process one capture end to end.
    ///
    /// Marks the capture Processing, extracts and analyzes its content,
    /// derives deadline and plan, applies the plan's actions in priority
    /// order, and marks the capture Completed. Unhandled errors mark it
    /// Failed and re-raise so the queue's retry policy engages. Completed
    /// captures short-circuit, making queue redelivery a no-op.
    #[instrument(skip(self), fields(capture_id = %capture_id, user_id = %user_id))]
    pub async fn process_capture(&self, capture_id: Uuid, user_id: Uuid) -> Result<()> {
        let start = Instant::now();

        let capture = self
            .deps
            .captures
            .get(capture_id)
            .await?
            .ok_or(Error::CaptureNotFound(capture_id))?;

        if capture.status.is_terminal() {
            info!("Capture already completed, skipping redelivered job");
            return Ok(());
        }

        if !self.deps.captures.mark_processing(capture_id).await? {
            info!("Capture reached a terminal state concurrently, skipping");
            return Ok(());
        }

        match self.run_pipeline(&capture, user_id).await {
            Ok(applied) => {
                self.deps.captures.mark_completed(capture_id).await?;
                info!(
                    action_count = applied,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Capture processed"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Capture processing failed");
                if let Err(mark_err) = self.deps.captures.mark_failed(capture_id).await {
                    error!(error = %mark_err, "Failed to mark capture failed");
                }
                Err(e)
            }
        }
    }

    /// Extraction → analysis/deadline → plan → side effects.
    async fn run_pipeline(&self, capture: &Capture, user_id: Uuid) -> Result<usize> {
        let now = Utc::now();

        // Extraction failures were already absorbed into a degraded stub
        let analysis = self.deps.extractors.extract_or_stub(capture).await;

        // The deadline module runs over whatever text we have, independently
        // of the analyzer: either one degrading leaves the other intact.
        let deadline_input = if analysis.full_text.trim().is_empty() {
            capture.content.as_str()
        } else {
            analysis.full_text.as_str()
        };
        let deadline = self
            .deps
            .deadline
            .extract(deadline_input, capture.context.as_deref(), now)
            .await;

        let plan = self
            .deps
            .planner
            .create_plan(&analysis, &deadline, capture.id, user_id, now)
            .await;

        self.apply_plan(capture, &analysis, plan.actions, now).await
    }

    /// Apply actions in planner priority order (stable: ties keep list
    /// order). Returns how many actions were applied.
    async fn apply_plan(
        &self,
        capture: &Capture,
        analysis: &DeepAnalysis,
        mut actions: Vec<Action>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        actions.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut applied = 0;
        for action in &actions {
            self.apply_action(capture, analysis, action, now).await?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply one action. Side effects are keyed on
    /// (capture, action type, discriminating data) so a retried job cannot
    /// duplicate them. Notification failures are recovered here; everything
    /// else propagates to the job-retry mechanism.
    async fn apply_action(
        &self,
        capture: &Capture,
        analysis: &DeepAnalysis,
        action: &Action,
        now: DateTime<Utc>,
    ) -> Result<()> {
        debug!(
            capture_id = %capture.id,
            action = action.action_type.as_str(),
            priority = action.priority,
            "Applying action"
        );

        match action.action_type {
            ActionType::AddTag => {
                let tags: Vec<String> = match action.data.get("tags") {
                    Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
                    None => action
                        .data
                        .get("tag")
                        .and_then(|t| t.as_str())
                        .map(|t| vec![t.to_string()])
                        .unwrap_or_default(),
                };
                for tag in tags {
                    self.deps
                        .tags
                        .add_to_capture(capture.id, &tag, "pipeline")
                        .await?;
                }
            }

            ActionType::AddToCollection => {
                let name = action
                    .data
                    .get("collection")
                    .or_else(|| action.data.get("name"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        (!analysis.content_kind.is_empty())
                            .then(|| analysis.content_kind.clone())
                    });
                let Some(name) = name else {
                    warn!(
                        capture_id = %capture.id,
                        "ADD_TO_COLLECTION without a collection name, skipping"
                    );
                    return Ok(());
                };
                let collection = self.deps.matcher.resolve(capture.user_id, &name).await?;
                self.deps
                    .collections
                    .add_capture(collection.id, capture.id)
                    .await?;
            }

            ActionType::CreateReminder => {
                let Some(remind_at) = action
                    .data
                    .get("remind_at")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                else {
                    warn!(
                        capture_id = %capture.id,
                        "CREATE_REMINDER without a valid remind_at, skipping"
                    );
                    return Ok(());
                };
                let message = action
                    .data
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&analysis.title);

                // None means the reminder already exists (retried attempt):
                // its job was enqueued the first time around.
                let created = self
                    .deps
                    .reminders
                    .create(capture.id, capture.user_id, remind_at, message)
                    .await?;

                if let Some(reminder) = created {
                    // A past-due schedule fires immediately (zero delay)
                    let delay = delay_until(remind_at, now);
                    self.deps
                        .jobs
                        .enqueue(
                            &JobPayload::ReminderSending {
                                reminder_id: reminder.id,
                            },
                            EnqueueOptions {
                                delay: Some(delay),
                                ..Default::default()
                            },
                        )
                        .await?;
                } else {
                    debug!(
                        capture_id = %capture.id,
                        "Reminder already exists, skipping re-enqueue"
                    );
                }
            }

            ActionType::CreateCalendarEvent => {
                // Calendar sync is an external collaborator; persist the
                // durable event record it consumes.
                let title = action
                    .data
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&analysis.title);
                let when = action.data.get("when").and_then(|v| v.as_str());
                self.deps
                    .dispatcher
                    .record_calendar_event(capture.user_id, capture.id, title, when)
                    .await?;
            }

            ActionType::Notify => {
                let payload = notification_from_action(action, analysis, capture);
                // Notification failures never fail the capture job
                match self.deps.dispatcher.send(capture.user_id, &payload).await {
                    Ok(result) if !result.success => {
                        debug!(
                            capture_id = %capture.id,
                            reason = result.reason.as_deref().unwrap_or(""),
                            "Notification not delivered"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            capture_id = %capture.id,
                            error = %e,
                            "Notification dispatch failed, continuing"
                        );
                    }
                }
            }

            ActionType::Summarize => {
                let summary = action
                    .data
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&analysis.description);
                if !summary.trim().is_empty() {
                    self.deps
                        .captures
                        .set_summary(capture.id, summary.trim())
                        .await?;
                }
            }

            ActionType::ExtractEntities => {
                if !analysis.entities.is_empty() {
                    self.deps
                        .captures
                        .merge_metadata(
                            capture.id,
                            serde_json::json!({ "entities": analysis.entities }),
                        )
                        .await?;
                }
            }
        }

        Ok(())
    }
}

/// Build the dispatcher payload for a NOTIFY action.
fn notification_from_action(
    action: &Action,
    analysis: &DeepAnalysis,
    capture: &Capture,
) -> NotificationPayload {
    NotificationPayload {
        title: action
            .data
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Saved")
            .to_string(),
        body: action
            .data
            .get("body")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("\"{}\" was saved and processed.", analysis.title)),
        action: action
            .data
            .get("action")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        data: Some(serde_json::json!({ "capture_id": capture.id })),
        priority: action.data.get("priority").and_then(|v| v.as_i64()).map(|p| p as i32),
    }
}
