//! Core data models for the stash content-processing engine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// CAPTURE TYPES
// =============================================================================

/// The kind of content a capture holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Link,
    Text,
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Other,
}

impl ContentType {
    /// String form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = Error;

    /// An unrecognized content type is a validation failure, not a fallback.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "link" => Ok(Self::Link),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "pdf" => Ok(Self::Pdf),
            "document" => Ok(Self::Document),
            "other" => Ok(Self::Other),
            other => Err(Error::InvalidInput(format!(
                "Unknown content type: {other}"
            ))),
        }
    }
}

/// Processing lifecycle of a capture.
///
/// Transitions only move forward within one processing attempt:
/// Pending → Processing → (Completed | Failed). Completed is terminal.
/// A redelivered queue attempt may re-enter Processing from Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CaptureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether moving to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: CaptureStatus) -> bool {
        use CaptureStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
        )
    }

    /// Terminal states are never overwritten.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::str::FromStr for CaptureStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!(
                "Unknown capture status: {other}"
            ))),
        }
    }
}

/// A unit of ingested user content with a processing lifecycle.
///
/// Created by the ingestion gateway, mutated only by the coordinator,
/// never deleted by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_type: ContentType,
    /// Raw content: a URL for link/pdf/video captures, body text otherwise.
    pub content: String,
    /// Optional user-supplied context ("why I saved this").
    pub context: Option<String>,
    /// Free-form metadata map.
    pub metadata: JsonValue,
    pub status: CaptureStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ANALYSIS TYPES
// =============================================================================

/// Difficulty tier of the analyzed content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Lenient parse; anything unrecognized maps to Beginner.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "intermediate" | "medium" => Self::Intermediate,
            "advanced" | "hard" | "expert" => Self::Advanced,
            _ => Self::Beginner,
        }
    }
}

/// Named entities detected in content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMap {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
}

impl EntityMap {
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
            && self.organizations.is_empty()
            && self.technologies.is_empty()
            && self.locations.is_empty()
    }
}

/// Structured understanding of a capture's content.
///
/// Produced fresh per processing run and never persisted as its own entity;
/// only the actions and side effects it induces are durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepAnalysis {
    pub title: String,
    pub description: String,
    /// Full extracted text (pre-truncation source for the analyzer).
    pub full_text: String,
    /// Intent category tag, e.g. "article", "tutorial", "job-posting".
    /// Empty when unknown.
    pub content_kind: String,
    pub topics: Vec<String>,
    pub entities: EntityMap,
    pub key_takeaways: Vec<String>,
    pub action_items: Vec<String>,
    /// Raw date strings the analyzer noticed in the content.
    pub detected_dates: Vec<String>,
    pub difficulty: Difficulty,
    /// Estimated consumption time in minutes.
    pub estimated_minutes: u32,
    /// True when this analysis is a degraded stub substituted after an
    /// extraction or inference failure.
    pub degraded: bool,
}

impl DeepAnalysis {
    /// Safe placeholder substituted when extraction or analysis fails.
    ///
    /// Empty topic/entity lists, a type-appropriate placeholder title, and
    /// the `degraded` flag set so downstream consumers can tell this apart
    /// from a model-derived analysis.
    pub fn degraded_stub(content_type: ContentType) -> Self {
        let title = match content_type {
            ContentType::Link => "Saved Link",
            ContentType::Text => "Note",
            ContentType::Image => "Image",
            ContentType::Video => "Video",
            ContentType::Audio => "Audio",
            ContentType::Pdf => "PDF Document",
            ContentType::Document => "Document",
            ContentType::Other => "Saved Item",
        };
        Self {
            title: title.to_string(),
            description: "Automatic analysis was unavailable for this capture.".to_string(),
            full_text: String::new(),
            content_kind: String::new(),
            topics: Vec::new(),
            entities: EntityMap::default(),
            key_takeaways: Vec::new(),
            action_items: Vec::new(),
            detected_dates: Vec::new(),
            difficulty: Difficulty::Beginner,
            estimated_minutes: 0,
            degraded: true,
        }
    }

    /// Stub variant that preserves text extracted before the failure.
    pub fn degraded_stub_with_text(content_type: ContentType, full_text: String) -> Self {
        Self {
            full_text,
            ..Self::degraded_stub(content_type)
        }
    }
}

// =============================================================================
// DEADLINE TYPES
// =============================================================================

/// Four-level classification of time pressure.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Deterministic urgency from hours remaining until a deadline.
    ///
    /// critical iff 0 < h < 24; high iff 24 <= h < 72; medium iff
    /// 72 <= h < 168; low otherwise (including past-due).
    pub fn from_hours_until(hours: f64) -> Self {
        if hours > 0.0 && hours < 24.0 {
            Self::Critical
        } else if (24.0..72.0).contains(&hours) {
            Self::High
        } else if (72.0..168.0).contains(&hours) {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lenient parse of an urgency label; unrecognized values normalize to Low.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deadline information extracted from content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDeadline {
    pub has_deadline: bool,
    /// Always UTC when present; serialized as ISO-8601.
    pub deadline: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub urgency: Urgency,
    /// Clamped to [0, 1].
    pub confidence: f32,
}

impl ExtractedDeadline {
    /// The safe, inert default returned on any capability failure.
    pub fn none() -> Self {
        Self {
            has_deadline: false,
            deadline: None,
            description: None,
            urgency: Urgency::Low,
            confidence: 0.0,
        }
    }
}

impl Default for ExtractedDeadline {
    fn default() -> Self {
        Self::none()
    }
}

// =============================================================================
// ACTION PLAN TYPES
// =============================================================================

/// Typed follow-up operation derived from analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AddToCollection,
    CreateReminder,
    AddTag,
    CreateCalendarEvent,
    Notify,
    Summarize,
    ExtractEntities,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddToCollection => "ADD_TO_COLLECTION",
            Self::CreateReminder => "CREATE_REMINDER",
            Self::AddTag => "ADD_TAG",
            Self::CreateCalendarEvent => "CREATE_CALENDAR_EVENT",
            Self::Notify => "NOTIFY",
            Self::Summarize => "SUMMARIZE",
            Self::ExtractEntities => "EXTRACT_ENTITIES",
        }
    }

    /// Parse a wire-format action type; unknown types are discarded by the
    /// planner rather than treated as an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADD_TO_COLLECTION" => Some(Self::AddToCollection),
            "CREATE_REMINDER" => Some(Self::CreateReminder),
            "ADD_TAG" => Some(Self::AddTag),
            "CREATE_CALENDAR_EVENT" => Some(Self::CreateCalendarEvent),
            "NOTIFY" => Some(Self::Notify),
            "SUMMARIZE" => Some(Self::Summarize),
            "EXTRACT_ENTITIES" => Some(Self::ExtractEntities),
            _ => None,
        }
    }
}

/// Clamp a model-returned confidence into [0, 1]. NaN maps to 0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Clamp a model-returned action priority into [1, 10].
pub fn clamp_priority(value: i64) -> i32 {
    value.clamp(1, 10) as i32
}

/// A single planned action with a type-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub data: JsonValue,
    /// Always within [1, 10] regardless of what the inference service returned.
    pub priority: i32,
    pub reasoning: String,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        data: JsonValue,
        priority: i64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            data,
            priority: clamp_priority(priority),
            reasoning: reasoning.into(),
        }
    }
}

/// Prioritized set of follow-up operations for one capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub capture_id: Uuid,
    pub user_id: Uuid,
    pub actions: Vec<Action>,
    pub reasoning: String,
    /// Always within [0, 1] regardless of what the inference service returned.
    pub confidence: f32,
}

impl ActionPlan {
    pub fn new(
        capture_id: Uuid,
        user_id: Uuid,
        actions: Vec<Action>,
        reasoning: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            capture_id,
            user_id,
            actions,
            reasoning: reasoning.into(),
            confidence: clamp_confidence(confidence),
        }
    }
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    /// Exhausted all attempts; dead-lettered for operator inspection.
    Failed,
    Cancelled,
}

/// Kind of asynchronous work, each with its own retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    CaptureProcessing,
    ReminderSending,
    ProactiveAgent,
    PatternLearning,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptureProcessing => "capture-processing",
            Self::ReminderSending => "reminder-sending",
            Self::ProactiveAgent => "proactive-agent",
            Self::PatternLearning => "pattern-learning",
        }
    }

    /// Default priority for this job kind (higher = more urgent).
    pub fn default_priority(&self) -> i32 {
        match self {
            // Reminders are time-sensitive
            Self::ReminderSending => 9,
            // Capture processing gates everything downstream
            Self::CaptureProcessing => 7,
            Self::ProactiveAgent => 3,
            // Best-effort background learning
            Self::PatternLearning => 1,
        }
    }

    /// Retry policy for this job kind.
    ///
    /// Reminders retry more times with a shorter initial backoff (cheap to
    /// repeat, time-sensitive); pattern learning is best-effort with a fixed
    /// interval and few attempts.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::CaptureProcessing => RetryPolicy {
                max_attempts: 3,
                backoff: Backoff::Exponential {
                    initial: Duration::from_secs(30),
                },
            },
            Self::ReminderSending => RetryPolicy {
                max_attempts: 5,
                backoff: Backoff::Exponential {
                    initial: Duration::from_secs(10),
                },
            },
            Self::ProactiveAgent => RetryPolicy {
                max_attempts: 2,
                backoff: Backoff::Fixed {
                    interval: Duration::from_secs(300),
                },
            },
            Self::PatternLearning => RetryPolicy {
                max_attempts: 2,
                backoff: Backoff::Fixed {
                    interval: Duration::from_secs(600),
                },
            },
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "capture-processing" => Ok(Self::CaptureProcessing),
            "reminder-sending" => Ok(Self::ReminderSending),
            "proactive-agent" => Ok(Self::ProactiveAgent),
            "pattern-learning" => Ok(Self::PatternLearning),
            other => Err(Error::Job(format!("Unknown job kind: {other}"))),
        }
    }
}

/// Backoff schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Delay doubles for each attempt, starting from `initial`.
    Exponential { initial: Duration },
    /// Constant delay between attempts.
    Fixed { interval: Duration },
}

impl Backoff {
    /// Delay before the given attempt (1-based), capped at
    /// [`defaults::MAX_BACKOFF_SECS`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = match self {
            Self::Exponential { initial } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor)
            }
            Self::Fixed { interval } => *interval,
        };
        raw.min(Duration::from_secs(defaults::MAX_BACKOFF_SECS))
    }
}

/// Retry policy declared by a job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub backoff: Backoff,
}

/// Typed job payload, one variant per kind.
///
/// Payloads reference entities by identifier only so retries always re-read
/// current data. Dispatch is a closed match over the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobPayload {
    CaptureProcessing {
        capture_id: Uuid,
        user_id: Uuid,
    },
    ReminderSending {
        reminder_id: Uuid,
    },
    /// Opaque to this core; executed by the agent service.
    ProactiveAgent {
        user_id: Uuid,
        #[serde(default)]
        params: JsonValue,
    },
    /// Opaque to this core; executed by the learning service.
    PatternLearning {
        user_id: Uuid,
        #[serde(default)]
        params: JsonValue,
    },
}

impl JobPayload {
    /// The job kind this payload belongs to.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::CaptureProcessing { .. } => JobKind::CaptureProcessing,
            Self::ReminderSending { .. } => JobKind::ReminderSending,
            Self::ProactiveAgent { .. } => JobKind::ProactiveAgent,
            Self::PatternLearning { .. } => JobKind::PatternLearning,
        }
    }

    /// The capture this payload references, if any (used for enqueue dedup).
    pub fn capture_id(&self) -> Option<Uuid> {
        match self {
            Self::CaptureProcessing { capture_id, .. } => Some(*capture_id),
            _ => None,
        }
    }
}

/// A durable unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub capture_id: Option<Uuid>,
    pub kind: JobKind,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: JsonValue,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Not-before time; delayed jobs are not claimable until this passes.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Decode the typed payload for this job.
    pub fn typed_payload(&self) -> Result<JobPayload> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            Error::Job(format!(
                "Malformed payload for {} job {}: {e}",
                self.kind.as_str(),
                self.id
            ))
        })
    }
}

/// Options for enqueueing a job.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Delay before the job becomes claimable.
    pub delay: Option<Duration>,
    /// Override the kind's default max attempts.
    pub max_attempts: Option<i32>,
    /// Override the kind's default priority.
    pub priority: Option<i32>,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    /// Jobs that exhausted their attempts and await operator inspection.
    pub dead: i64,
    pub total: i64,
}

/// Compute the enqueue delay for an absolute schedule.
///
/// A past-due schedule fires immediately (zero delay) rather than erroring.
pub fn delay_until(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (scheduled_at - now).to_std().unwrap_or(Duration::ZERO)
}

// =============================================================================
// REMINDER & NOTIFICATION TYPES
// =============================================================================

/// A scheduled reminder derived from a capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub capture_id: Uuid,
    pub user_id: Uuid,
    pub remind_at: DateTime<Utc>,
    pub message: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Durable record of a delivered (or attempted) notification.
///
/// Read/unread state is mutated only by the consuming client, never by the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub metadata: JsonValue,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload handed to the notification dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// Result of a single dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Machine-readable code when `success` is false without an exception,
    /// e.g. "no_delivery_target".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DispatchResult {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            reason: None,
        }
    }

    pub fn undelivered(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate outcome of a batch dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDispatch {
    pub sent: usize,
    pub failed: usize,
}

/// A push delivery target registered by a user's device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// COLLECTION & TAG TYPES
// =============================================================================

/// A user-scoped collection of captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_round_trip() {
        for ct in [
            ContentType::Link,
            ContentType::Text,
            ContentType::Image,
            ContentType::Video,
            ContentType::Audio,
            ContentType::Pdf,
            ContentType::Document,
            ContentType::Other,
        ] {
            assert_eq!(ct.as_str().parse::<ContentType>().unwrap(), ct);
        }
    }

    #[test]
    fn test_content_type_unknown_is_error() {
        assert!("spreadsheet".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_capture_status_forward_transitions() {
        use CaptureStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        // New attempt after a failed one
        assert!(Failed.can_transition_to(Processing));
    }

    #[test]
    fn test_capture_status_never_regresses() {
        use CaptureStatus::*;
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn test_urgency_thresholds() {
        // critical iff 0 < h < 24
        assert_eq!(Urgency::from_hours_until(0.5), Urgency::Critical);
        assert_eq!(Urgency::from_hours_until(23.99), Urgency::Critical);
        // high iff 24 <= h < 72
        assert_eq!(Urgency::from_hours_until(24.0), Urgency::High);
        assert_eq!(Urgency::from_hours_until(71.99), Urgency::High);
        // medium iff 72 <= h < 168
        assert_eq!(Urgency::from_hours_until(72.0), Urgency::Medium);
        assert_eq!(Urgency::from_hours_until(167.99), Urgency::Medium);
        // else low
        assert_eq!(Urgency::from_hours_until(168.0), Urgency::Low);
        assert_eq!(Urgency::from_hours_until(1000.0), Urgency::Low);
        assert_eq!(Urgency::from_hours_until(0.0), Urgency::Low);
        assert_eq!(Urgency::from_hours_until(-5.0), Urgency::Low);
    }

    #[test]
    fn test_urgency_lenient_parse() {
        assert_eq!(Urgency::parse_lenient("critical"), Urgency::Critical);
        assert_eq!(Urgency::parse_lenient("HIGH"), Urgency::High);
        assert_eq!(Urgency::parse_lenient(" medium "), Urgency::Medium);
        assert_eq!(Urgency::parse_lenient("low"), Urgency::Low);
        // Anything outside the four recognized values normalizes to low
        assert_eq!(Urgency::parse_lenient("urgent!!"), Urgency::Low);
        assert_eq!(Urgency::parse_lenient(""), Urgency::Low);
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Critical > Urgency::High);
        assert!(Urgency::High > Urgency::Medium);
        assert!(Urgency::Medium > Urgency::Low);
    }

    #[test]
    fn test_degraded_stub_shape() {
        let stub = DeepAnalysis::degraded_stub(ContentType::Pdf);
        assert_eq!(stub.title, "PDF Document");
        assert!(stub.topics.is_empty());
        assert!(stub.entities.is_empty());
        assert!(stub.key_takeaways.is_empty());
        assert!(stub.degraded);
        assert!(stub.content_kind.is_empty());

        assert_eq!(DeepAnalysis::degraded_stub(ContentType::Video).title, "Video");
        assert_eq!(
            DeepAnalysis::degraded_stub(ContentType::Link).title,
            "Saved Link"
        );
    }

    #[test]
    fn test_deadline_inert_default() {
        let d = ExtractedDeadline::none();
        assert!(!d.has_deadline);
        assert!(d.deadline.is_none());
        assert_eq!(d.urgency, Urgency::Low);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(0.5), 0.5);
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.3), 0.0);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
    }

    #[test]
    fn test_clamp_priority() {
        assert_eq!(clamp_priority(5), 5);
        assert_eq!(clamp_priority(0), 1);
        assert_eq!(clamp_priority(99), 10);
        assert_eq!(clamp_priority(-3), 1);
    }

    #[test]
    fn test_action_type_parse() {
        assert_eq!(ActionType::parse("ADD_TAG"), Some(ActionType::AddTag));
        assert_eq!(ActionType::parse("notify"), Some(ActionType::Notify));
        assert_eq!(
            ActionType::parse("ADD_TO_COLLECTION"),
            Some(ActionType::AddToCollection)
        );
        assert_eq!(ActionType::parse("DELETE_EVERYTHING"), None);
    }

    #[test]
    fn test_job_kind_round_trip() {
        for kind in [
            JobKind::CaptureProcessing,
            JobKind::ReminderSending,
            JobKind::ProactiveAgent,
            JobKind::PatternLearning,
        ] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("mystery-work".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_retry_policies() {
        let cp = JobKind::CaptureProcessing.retry_policy();
        assert_eq!(cp.max_attempts, 3);
        assert!(matches!(cp.backoff, Backoff::Exponential { .. }));

        let rs = JobKind::ReminderSending.retry_policy();
        assert_eq!(rs.max_attempts, 5);
        // Shorter initial backoff than capture processing
        assert_eq!(
            rs.backoff.delay_for_attempt(1),
            Duration::from_secs(10)
        );
        assert!(cp.backoff.delay_for_attempt(1) > rs.backoff.delay_for_attempt(1));

        let pl = JobKind::PatternLearning.retry_policy();
        assert_eq!(pl.max_attempts, 2);
        assert!(matches!(pl.backoff, Backoff::Fixed { .. }));
    }

    #[test]
    fn test_exponential_backoff_schedule() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(30),
        };
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(30));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(60));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(120));
        // Capped
        assert_eq!(
            backoff.delay_for_attempt(20),
            Duration::from_secs(defaults::MAX_BACKOFF_SECS)
        );
    }

    #[test]
    fn test_fixed_backoff_schedule() {
        let backoff = Backoff::Fixed {
            interval: Duration::from_secs(300),
        };
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(300));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_secs(300));
    }

    #[test]
    fn test_job_payload_serde_round_trip() {
        let payload = JobPayload::CaptureProcessing {
            capture_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "capture-processing");
        let back: JobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.kind(), JobKind::CaptureProcessing);
    }

    #[test]
    fn test_job_payload_capture_id() {
        let capture_id = Uuid::new_v4();
        let payload = JobPayload::CaptureProcessing {
            capture_id,
            user_id: Uuid::new_v4(),
        };
        assert_eq!(payload.capture_id(), Some(capture_id));

        let reminder = JobPayload::ReminderSending {
            reminder_id: Uuid::new_v4(),
        };
        assert_eq!(reminder.capture_id(), None);
    }

    #[test]
    fn test_delay_until_past_due_is_zero() {
        let now = Utc::now();
        let past = now - chrono::Duration::minutes(10);
        assert_eq!(delay_until(past, now), Duration::ZERO);
    }

    #[test]
    fn test_delay_until_future() {
        let now = Utc::now();
        let future = now + chrono::Duration::minutes(5);
        let delay = delay_until(future, now);
        assert_eq!(delay, Duration::from_secs(300));
    }

    #[test]
    fn test_dispatch_result_constructors() {
        let ok = DispatchResult::delivered("msg-1");
        assert!(ok.success);
        assert_eq!(ok.message_id.as_deref(), Some("msg-1"));
        assert!(ok.reason.is_none());

        let bad = DispatchResult::undelivered("no_delivery_target");
        assert!(!bad.success);
        assert_eq!(bad.reason.as_deref(), Some("no_delivery_target"));
    }

    #[test]
    fn test_action_clamps_on_construction() {
        let action = Action::new(
            ActionType::AddTag,
            serde_json::json!({"tags": ["rust"]}),
            42,
            "tag it",
        );
        assert_eq!(action.priority, 10);

        let plan = ActionPlan::new(Uuid::new_v4(), Uuid::new_v4(), vec![action], "r", 3.0);
        assert_eq!(plan.confidence, 1.0);
    }
}
