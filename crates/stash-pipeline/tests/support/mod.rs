//! In-memory repository fakes for pipeline integration tests.
//!
//! Each fake mirrors the keyed-write semantics of its PostgreSQL
//! counterpart (conflict-keyed inserts, forward-only status transitions,
//! retry rescheduling) so coordinator behavior is exercised faithfully
//! without a database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stash_core::*;

// =============================================================================
// CAPTURES
// =============================================================================

#[derive(Default)]
pub struct MemoryCaptures {
    pub items: Mutex<HashMap<Uuid, Capture>>,
}

impl MemoryCaptures {
    pub fn status_of(&self, id: Uuid) -> Option<CaptureStatus> {
        self.items.lock().unwrap().get(&id).map(|c| c.status)
    }

    pub fn metadata_of(&self, id: Uuid) -> Option<JsonValue> {
        self.items.lock().unwrap().get(&id).map(|c| c.metadata.clone())
    }

    /// Force a status, simulating a crash mid-processing.
    pub fn force_status(&self, id: Uuid, status: CaptureStatus) {
        if let Some(c) = self.items.lock().unwrap().get_mut(&id) {
            c.status = status;
        }
    }
}

#[async_trait]
impl CaptureRepository for MemoryCaptures {
    async fn insert(&self, req: CreateCaptureRequest) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();
        self.items.lock().unwrap().insert(
            id,
            Capture {
                id,
                user_id: req.user_id,
                content_type: req.content_type,
                content: req.content,
                context: req.context,
                metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
                status: CaptureStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Capture>> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        let Some(capture) = items.get_mut(&id) else {
            return Err(Error::CaptureNotFound(id));
        };
        if capture.status.is_terminal() {
            return Ok(false);
        }
        capture.status = CaptureStatus::Processing;
        capture.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(capture) = items.get_mut(&id) {
            if capture.status == CaptureStatus::Processing {
                capture.status = CaptureStatus::Completed;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(capture) = items.get_mut(&id) {
            if capture.status == CaptureStatus::Processing {
                capture.status = CaptureStatus::Failed;
            }
        }
        Ok(())
    }

    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(capture) = items.get_mut(&id) {
            capture.metadata["summary"] = serde_json::json!(summary);
        }
        Ok(())
    }

    async fn merge_metadata(&self, id: Uuid, patch: JsonValue) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(capture) = items.get_mut(&id) {
            if let (Some(target), Some(source)) =
                (capture.metadata.as_object_mut(), patch.as_object())
            {
                for (k, v) in source {
                    target.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TAGS
// =============================================================================

#[derive(Default)]
pub struct MemoryTags {
    pub items: Mutex<Vec<(Uuid, String)>>,
}

#[async_trait]
impl TagRepository for MemoryTags {
    async fn add_to_capture(&self, capture_id: Uuid, tag: &str, _source: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        // Keyed on (capture, tag), like ON CONFLICT DO NOTHING
        if !items.iter().any(|(c, t)| *c == capture_id && t == tag) {
            items.push((capture_id, tag.to_string()));
        }
        Ok(())
    }

    async fn get_for_capture(&self, capture_id: Uuid) -> Result<Vec<String>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == capture_id)
            .map(|(_, t)| t.clone())
            .collect())
    }
}

// =============================================================================
// COLLECTIONS
// =============================================================================

#[derive(Default)]
pub struct MemoryCollections {
    pub collections: Mutex<Vec<Collection>>,
    pub memberships: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl MemoryCollections {
    pub fn membership_count(&self) -> usize {
        self.memberships.lock().unwrap().len()
    }
}

#[async_trait]
impl CollectionRepository for MemoryCollections {
    async fn get_or_create(&self, user_id: Uuid, name: &str) -> Result<Collection> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(existing) = collections
            .iter()
            .find(|c| c.user_id == user_id && c.name == name)
        {
            return Ok(existing.clone());
        }
        let collection = Collection {
            id: new_v7(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        collections.push(collection.clone());
        Ok(collection)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Collection>> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_capture(&self, collection_id: Uuid, capture_id: Uuid) -> Result<()> {
        self.memberships
            .lock()
            .unwrap()
            .insert((collection_id, capture_id));
        Ok(())
    }

    async fn captures_in(&self, collection_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == collection_id)
            .map(|(_, capture)| *capture)
            .collect())
    }
}

// =============================================================================
// REMINDERS
// =============================================================================

#[derive(Default)]
pub struct MemoryReminders {
    pub items: Mutex<Vec<Reminder>>,
}

impl MemoryReminders {
    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn seed(&self, reminder: Reminder) {
        self.items.lock().unwrap().push(reminder);
    }
}

#[async_trait]
impl ReminderRepository for MemoryReminders {
    async fn create(
        &self,
        capture_id: Uuid,
        user_id: Uuid,
        remind_at: DateTime<Utc>,
        message: &str,
    ) -> Result<Option<Reminder>> {
        let mut items = self.items.lock().unwrap();
        // Unique on (capture, remind_at)
        if items
            .iter()
            .any(|r| r.capture_id == capture_id && r.remind_at == remind_at)
        {
            return Ok(None);
        }
        let reminder = Reminder {
            id: new_v7(),
            capture_id,
            user_id,
            remind_at,
            message: message.to_string(),
            sent_at: None,
            created_at: Utc::now(),
        };
        items.push(reminder.clone());
        Ok(Some(reminder))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(reminder) = items.iter_mut().find(|r| r.id == id) {
            if reminder.sent_at.is_none() {
                reminder.sent_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

// =============================================================================
// INSIGHTS & DEVICES & USERS
// =============================================================================

#[derive(Default)]
pub struct MemoryInsights {
    pub items: Mutex<Vec<Insight>>,
}

impl MemoryInsights {
    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Insight> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait]
impl InsightRepository for MemoryInsights {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
        metadata: JsonValue,
    ) -> Result<Uuid> {
        let id = new_v7();
        self.items.lock().unwrap().push(Insight {
            id,
            user_id,
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            metadata,
            is_read: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(insight) = items.iter_mut().find(|i| i.id == id) {
            insight.is_read = true;
        }
        Ok(())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.user_id == user_id && !i.is_read)
            .count() as i64)
    }
}

#[derive(Default)]
pub struct MemoryDevices {
    pub items: Mutex<Vec<DeviceRegistration>>,
}

impl MemoryDevices {
    pub fn seed(&self, user_id: Uuid, token: &str) -> Uuid {
        let id = new_v7();
        self.items.lock().unwrap().push(DeviceRegistration {
            id,
            user_id,
            token: token.to_string(),
            platform: "test".to_string(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceRepository for MemoryDevices {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DeviceRegistration>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        self.items.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    pub known: Mutex<HashSet<Uuid>>,
}

impl MemoryUsers {
    pub fn seed(&self, id: Uuid) {
        self.known.lock().unwrap().insert(id);
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.known.lock().unwrap().contains(&id))
    }
}

// =============================================================================
// JOB QUEUE
// =============================================================================

#[derive(Default)]
pub struct MemoryJobs {
    pub items: Mutex<Vec<Job>>,
}

impl MemoryJobs {
    pub fn count_of_kind(&self, kind: JobKind) -> usize {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.kind == kind)
            .count()
    }

    pub fn all(&self) -> Vec<Job> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRepository for MemoryJobs {
    async fn enqueue(&self, payload: &JobPayload, options: EnqueueOptions) -> Result<Uuid> {
        let kind = payload.kind();
        let policy = kind.retry_policy();
        let now = Utc::now();
        let run_at = match options.delay {
            Some(delay) => {
                now + ChronoDuration::from_std(delay)
                    .map_err(|e| Error::Job(format!("Delay out of range: {e}")))?
            }
            None => now,
        };
        let job = Job {
            id: new_v7(),
            capture_id: payload.capture_id(),
            kind,
            status: JobStatus::Pending,
            priority: options.priority.unwrap_or_else(|| kind.default_priority()),
            payload: serde_json::to_value(payload)?,
            result: None,
            error_message: None,
            attempts: 0,
            max_attempts: options.max_attempts.unwrap_or(policy.max_attempts),
            run_at,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        let id = job.id;
        self.items.lock().unwrap().push(job);
        Ok(id)
    }

    async fn enqueue_deduplicated(
        &self,
        payload: &JobPayload,
        options: EnqueueOptions,
    ) -> Result<Option<Uuid>> {
        if let Some(capture_id) = payload.capture_id() {
            let duplicate = self.items.lock().unwrap().iter().any(|j| {
                j.capture_id == Some(capture_id)
                    && j.kind == payload.kind()
                    && matches!(j.status, JobStatus::Pending | JobStatus::Running)
            });
            if duplicate {
                return Ok(None);
            }
        }
        self.enqueue(payload, options).await.map(Some)
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut items = self.items.lock().unwrap();

        let mut candidates: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, j)| {
                j.status == JobStatus::Pending
                    && j.run_at <= now
                    && (kinds.is_empty() || kinds.contains(&j.kind))
            })
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|&a, &b| {
            items[b]
                .priority
                .cmp(&items[a].priority)
                .then(items[a].run_at.cmp(&items[b].run_at))
                .then(items[a].created_at.cmp(&items[b].created_at))
        });

        let Some(&idx) = candidates.first() else {
            return Ok(None);
        };
        items[idx].status = JobStatus::Running;
        items[idx].started_at = Some(now);
        Ok(Some(items[idx].clone()))
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if let Some(job) = items.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.result = result;
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let Some(job) = items.iter_mut().find(|j| j.id == job_id) else {
            return Err(Error::Job(format!("Cannot fail unknown job {job_id}")));
        };
        let consumed = job.attempts + 1;
        job.attempts = consumed;
        job.error_message = Some(error.to_string());
        if consumed < job.max_attempts {
            let delay = job
                .kind
                .retry_policy()
                .backoff
                .delay_for_attempt(consumed as u32);
            job.status = JobStatus::Pending;
            job.started_at = None;
            job.run_at = Utc::now()
                + ChronoDuration::from_std(delay)
                    .map_err(|e| Error::Job(format!("Backoff out of range: {e}")))?;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }

    async fn list_dead_lettered(&self, limit: i64) -> Result<Vec<Job>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let items = self.items.lock().unwrap();
        let count = |status: JobStatus| items.iter().filter(|j| j.status == status).count() as i64;
        Ok(QueueStats {
            pending: count(JobStatus::Pending),
            running: count(JobStatus::Running),
            completed_last_hour: count(JobStatus::Completed),
            failed_last_hour: count(JobStatus::Failed),
            dead: count(JobStatus::Failed),
            total: items.len() as i64,
        })
    }
}
