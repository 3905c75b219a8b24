//! Action planner: turns analysis into a prioritized plan, with a
//! deterministic heuristic fallback when the inference capability fails.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use stash_core::{
    clamp_confidence, defaults, Action, ActionPlan, ActionType, DeepAnalysis, ExtractedDeadline,
    Outcome, StructuredInference, StructuredRequest, Urgency,
};
use stash_inference::InferenceLimiter;

const PLANNER_SYSTEM: &str = "You plan follow-up actions for newly saved content in a \
personal knowledge base. Respond with a single JSON object: actions (array), \
reasoning (string), confidence (number 0-1). Each action has: type (one of \
ADD_TO_COLLECTION, CREATE_REMINDER, ADD_TAG, CREATE_CALENDAR_EVENT, NOTIFY, \
SUMMARIZE, EXTRACT_ENTITIES), data (object), priority (1-10, higher first), \
reasoning (string). Data shapes: ADD_TAG {tags: [string]}, ADD_TO_COLLECTION \
{collection: string}, CREATE_REMINDER {remind_at: ISO datetime, message: string}, \
CREATE_CALENDAR_EVENT {title: string, when: ISO datetime}, NOTIFY {title: string, \
body: string}, SUMMARIZE {summary: string}, EXTRACT_ENTITIES {}.";

#[derive(Debug, Clone, Default, Deserialize)]
struct PlanActionFragment {
    #[serde(default, rename = "type")]
    action_type: String,
    #[serde(default)]
    data: JsonValue,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlanFragment {
    #[serde(default)]
    actions: Vec<PlanActionFragment>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: f32,
}

/// Planner calling the structured-inference capability.
pub struct Planner {
    backend: Arc<dyn StructuredInference>,
    limiter: Arc<InferenceLimiter>,
}

impl Planner {
    pub fn new(backend: Arc<dyn StructuredInference>, limiter: Arc<InferenceLimiter>) -> Self {
        Self { backend, limiter }
    }

    /// Create an action plan for the capture.
    ///
    /// Never fails: if the capability call fails for any reason, a
    /// deterministic heuristic plan is synthesized instead.
    pub async fn create_plan(
        &self,
        analysis: &DeepAnalysis,
        deadline: &ExtractedDeadline,
        capture_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ActionPlan {
        match self.call_capability(analysis, deadline).await {
            Outcome::Ok(fragment) => {
                let plan = Self::resolve(fragment, capture_id, user_id);
                debug!(
                    subsystem = "pipeline",
                    component = "planner",
                    capture_id = %capture_id,
                    action_count = plan.actions.len(),
                    confidence = plan.confidence,
                    "Model plan accepted"
                );
                plan
            }
            Outcome::Degraded(reason) => {
                warn!(
                    subsystem = "pipeline",
                    component = "planner",
                    capture_id = %capture_id,
                    reason = %reason,
                    degraded = true,
                    "Planner degraded, synthesizing heuristic plan"
                );
                fallback_plan(analysis, deadline, capture_id, user_id, now)
            }
        }
    }

    async fn call_capability(
        &self,
        analysis: &DeepAnalysis,
        deadline: &ExtractedDeadline,
    ) -> Outcome<PlanFragment> {
        let brief = build_brief(analysis, deadline);

        self.limiter.acquire().await;

        let value = match self
            .backend
            .generate_structured(StructuredRequest {
                system: PLANNER_SYSTEM.to_string(),
                prompt: brief,
                temperature: defaults::PLANNER_TEMPERATURE,
            })
            .await
        {
            Ok(value) => value,
            Err(e) => return Outcome::Degraded(e.to_string()),
        };

        match serde_json::from_value::<PlanFragment>(value) {
            Ok(fragment) => Outcome::Ok(fragment),
            Err(e) => Outcome::Degraded(format!("schema mismatch: {e}")),
        }
    }

    /// Validate and clamp a model answer into an ActionPlan.
    fn resolve(fragment: PlanFragment, capture_id: Uuid, user_id: Uuid) -> ActionPlan {
        let mut actions = Vec::new();
        for raw in fragment.actions {
            let Some(action_type) = ActionType::parse(&raw.action_type) else {
                warn!(
                    subsystem = "pipeline",
                    component = "planner",
                    action_type = %raw.action_type,
                    "Discarding action with unknown type"
                );
                continue;
            };
            actions.push(Action::new(
                action_type,
                raw.data,
                raw.priority,
                raw.reasoning,
            ));
        }

        ActionPlan::new(
            capture_id,
            user_id,
            actions,
            fragment.reasoning,
            clamp_confidence(fragment.confidence),
        )
    }
}

/// Build the textual brief handed to the planning model.
fn build_brief(analysis: &DeepAnalysis, deadline: &ExtractedDeadline) -> String {
    let mut brief = String::new();
    brief.push_str(&format!("Title: {}\n", analysis.title));
    if !analysis.description.is_empty() {
        brief.push_str(&format!("Description: {}\n", analysis.description));
    }
    if !analysis.content_kind.is_empty() {
        brief.push_str(&format!("Kind: {}\n", analysis.content_kind));
    }
    if !analysis.topics.is_empty() {
        brief.push_str(&format!("Topics: {}\n", analysis.topics.join(", ")));
    }
    if !analysis.key_takeaways.is_empty() {
        brief.push_str(&format!("Takeaways: {}\n", analysis.key_takeaways.join("; ")));
    }
    if !analysis.action_items.is_empty() {
        brief.push_str(&format!(
            "Action items: {}\n",
            analysis.action_items.join("; ")
        ));
    }
    if analysis.degraded {
        brief.push_str("Note: automatic analysis was unavailable for this capture.\n");
    }
    match (deadline.has_deadline, deadline.deadline) {
        (true, Some(at)) => {
            brief.push_str(&format!(
                "Deadline: {} (urgency: {})\n",
                at.to_rfc3339(),
                deadline.urgency
            ));
        }
        _ => brief.push_str("Deadline: none\n"),
    }
    brief
}

/// Deterministic heuristic plan used when the capability call fails.
///
/// Shape: up to three topic tags at priority 5, a collection assignment at
/// priority 7 when an intent category is known, a reminder an hour out at
/// priority 9 when the deadline module signals urgency, and always a
/// terminal NOTIFY at priority 3 confirming the save.
pub fn fallback_plan(
    analysis: &DeepAnalysis,
    deadline: &ExtractedDeadline,
    capture_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> ActionPlan {
    let mut actions = Vec::new();

    if !analysis.topics.is_empty() {
        let tags: Vec<&str> = analysis.topics.iter().take(3).map(|s| s.as_str()).collect();
        actions.push(Action::new(
            ActionType::AddTag,
            serde_json::json!({ "tags": tags }),
            5,
            "Tag with detected topics",
        ));
    }

    if !analysis.content_kind.is_empty() {
        actions.push(Action::new(
            ActionType::AddToCollection,
            serde_json::json!({ "collection": analysis.content_kind }),
            7,
            "File under the detected category",
        ));
    }

    if deadline.urgency >= Urgency::High {
        let remind_at = now + ChronoDuration::seconds(defaults::FALLBACK_REMINDER_DELAY_SECS);
        actions.push(Action::new(
            ActionType::CreateReminder,
            serde_json::json!({
                "remind_at": remind_at.to_rfc3339(),
                "message": format!("Time-sensitive: {}", analysis.title),
            }),
            9,
            "Deadline is close",
        ));
    }

    actions.push(Action::new(
        ActionType::Notify,
        serde_json::json!({
            "title": "Saved",
            "body": format!("\"{}\" was saved and processed.", analysis.title),
        }),
        3,
        "Confirm the save",
    ));

    ActionPlan::new(
        capture_id,
        user_id,
        actions,
        "Heuristic plan (inference unavailable)",
        defaults::FALLBACK_PLAN_CONFIDENCE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::ContentType;
    use stash_inference::MockInferenceBackend;

    fn planner_with(mock: &MockInferenceBackend) -> Planner {
        Planner::new(
            Arc::new(mock.clone()),
            Arc::new(InferenceLimiter::new(10_000)),
        )
    }

    fn analysis() -> DeepAnalysis {
        let mut a = DeepAnalysis::degraded_stub(ContentType::Link);
        a.degraded = false;
        a.title = "Rust Async Deep Dive".to_string();
        a.content_kind = "article".to_string();
        a.topics = vec![
            "rust".to_string(),
            "async".to_string(),
            "tokio".to_string(),
            "futures".to_string(),
        ];
        a
    }

    #[tokio::test]
    async fn test_fallback_plan_on_capability_failure() {
        let mock = MockInferenceBackend::new().failing();
        let planner = planner_with(&mock);
        let capture_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let plan = planner
            .create_plan(
                &analysis(),
                &ExtractedDeadline::none(),
                capture_id,
                user_id,
                Utc::now(),
            )
            .await;

        // Fixed heuristic confidence, distinct from model-derived plans
        assert_eq!(plan.confidence, 0.6);

        // Exactly one NOTIFY, added last
        let notify_count = plan
            .actions
            .iter()
            .filter(|a| a.action_type == ActionType::Notify)
            .count();
        assert_eq!(notify_count, 1);
        assert_eq!(
            plan.actions.last().unwrap().action_type,
            ActionType::Notify
        );
        assert_eq!(plan.actions.last().unwrap().priority, 3);

        // Topics → ADD_TAG with first three topics at priority 5
        let tag_action = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::AddTag)
            .unwrap();
        assert_eq!(tag_action.priority, 5);
        assert_eq!(
            tag_action.data["tags"],
            serde_json::json!(["rust", "async", "tokio"])
        );

        // Known category → ADD_TO_COLLECTION at priority 7
        let coll_action = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::AddToCollection)
            .unwrap();
        assert_eq!(coll_action.priority, 7);
        assert_eq!(coll_action.data["collection"], "article");
    }

    #[tokio::test]
    async fn test_fallback_plan_high_urgency_adds_reminder() {
        let mock = MockInferenceBackend::new().failing();
        let planner = planner_with(&mock);
        let now = Utc::now();

        let deadline = ExtractedDeadline {
            has_deadline: true,
            deadline: Some(now + ChronoDuration::hours(30)),
            description: None,
            urgency: Urgency::High,
            confidence: 0.8,
        };

        let plan = planner
            .create_plan(&analysis(), &deadline, Uuid::new_v4(), Uuid::new_v4(), now)
            .await;

        let reminder = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::CreateReminder)
            .unwrap();
        assert_eq!(reminder.priority, 9);

        let remind_at: DateTime<Utc> = reminder.data["remind_at"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(remind_at, now + ChronoDuration::hours(1));
    }

    #[tokio::test]
    async fn test_fallback_plan_minimal_for_degraded_stub() {
        let mock = MockInferenceBackend::new().failing();
        let planner = planner_with(&mock);

        let stub = DeepAnalysis::degraded_stub(ContentType::Pdf);
        let plan = planner
            .create_plan(
                &stub,
                &ExtractedDeadline::none(),
                Uuid::new_v4(),
                Uuid::new_v4(),
                Utc::now(),
            )
            .await;

        // No topics, no category, no urgency: the NOTIFY is the whole plan
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action_type, ActionType::Notify);
    }

    #[tokio::test]
    async fn test_model_plan_clamps_and_discards_unknown_types() {
        let mock = MockInferenceBackend::new().with_default_response(serde_json::json!({
            "actions": [
                {"type": "ADD_TAG", "data": {"tags": ["rust"]}, "priority": 99, "reasoning": "r"},
                {"type": "TELEPORT_USER", "data": {}, "priority": 5, "reasoning": "r"},
                {"type": "NOTIFY", "data": {"title": "t", "body": "b"}, "priority": -2, "reasoning": "r"}
            ],
            "reasoning": "looks good",
            "confidence": 4.2
        }));
        let planner = planner_with(&mock);

        let plan = planner
            .create_plan(
                &analysis(),
                &ExtractedDeadline::none(),
                Uuid::new_v4(),
                Uuid::new_v4(),
                Utc::now(),
            )
            .await;

        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.actions[0].priority, 10);
        assert_eq!(plan.actions[1].priority, 1);
        assert_eq!(plan.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_brief_includes_deadline() {
        let mock = MockInferenceBackend::new();
        let planner = planner_with(&mock);
        let now = Utc::now();
        let deadline = ExtractedDeadline {
            has_deadline: true,
            deadline: Some(now + ChronoDuration::hours(48)),
            description: Some("RSVP".to_string()),
            urgency: Urgency::High,
            confidence: 0.9,
        };

        let _ = planner
            .create_plan(&analysis(), &deadline, Uuid::new_v4(), Uuid::new_v4(), now)
            .await;

        let calls = mock.calls();
        assert!(calls[0].prompt.contains("Deadline:"));
        assert!(calls[0].prompt.contains("urgency: high"));
        assert!(calls[0].prompt.contains("Rust Async Deep Dive"));
    }
}
