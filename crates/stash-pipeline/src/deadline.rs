//! Deadline extraction with deterministic urgency derivation.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use stash_core::{
    clamp_confidence, defaults, ExtractedDeadline, Outcome, StructuredInference,
    StructuredRequest, Urgency,
};
use stash_inference::InferenceLimiter;

const DEADLINE_SYSTEM: &str = "You detect deadlines in saved content. Look for \
deadline-indicative language: application due dates, payment dues, RSVP-by \
dates, registration closings, expirations, submission windows. Respond with a \
single JSON object: has_deadline (boolean), deadline (ISO date or datetime \
string, null when none), description (short string naming what is due), \
urgency (low|medium|high|critical), confidence (number 0-1). When the content \
has no concrete deadline, return has_deadline false.";

/// Normalize a model-returned date string to a UTC timestamp.
///
/// Accepts RFC 3339, naive datetimes, plain dates, and long-form dates like
/// "January 25, 2026". A plain date normalizes to end-of-day so a deadline
/// "due on" that day has not yet passed at dawn. Anything unparseable is
/// None; a malformed timestamp is never propagated.
pub fn normalize_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for fmt in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            let end_of_day = date.and_hms_opt(23, 59, 59)?;
            return Some(Utc.from_utc_datetime(&end_of_day));
        }
    }

    None
}

/// The fixed result shape the deadline extractor asks the model for.
#[derive(Debug, Clone, Default, Deserialize)]
struct DeadlineFragment {
    #[serde(default)]
    has_deadline: bool,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    urgency: String,
    #[serde(default)]
    confidence: f32,
}

/// Deadline extractor calling the structured-inference capability at low
/// temperature (consistency over variety).
pub struct DeadlineExtractor {
    backend: Arc<dyn StructuredInference>,
    limiter: Arc<InferenceLimiter>,
}

impl DeadlineExtractor {
    pub fn new(backend: Arc<dyn StructuredInference>, limiter: Arc<InferenceLimiter>) -> Self {
        Self { backend, limiter }
    }

    /// Extract deadline information from content.
    ///
    /// Urgency is recomputed deterministically from the time remaining to
    /// the deadline at `now`; the model's own urgency label only survives
    /// (normalized) when no concrete date exists. Any capability failure
    /// returns the inert default.
    pub async fn extract(
        &self,
        content: &str,
        user_context: Option<&str>,
        now: DateTime<Utc>,
    ) -> ExtractedDeadline {
        match self.call_capability(content, user_context).await {
            Outcome::Ok(fragment) => Self::resolve(fragment, now),
            Outcome::Degraded(reason) => {
                warn!(
                    subsystem = "pipeline",
                    component = "deadline",
                    reason = %reason,
                    degraded = true,
                    "Deadline extraction degraded to inert default"
                );
                ExtractedDeadline::none()
            }
        }
    }

    async fn call_capability(
        &self,
        content: &str,
        user_context: Option<&str>,
    ) -> Outcome<DeadlineFragment> {
        let input = crate::analyzer::truncate_chars(content, defaults::ANALYSIS_INPUT_BUDGET);

        let mut prompt = String::new();
        if let Some(context) = user_context {
            if !context.trim().is_empty() {
                prompt.push_str(&format!("Saved with note: {context}\n\n"));
            }
        }
        prompt.push_str("Content:\n");
        prompt.push_str(input);

        self.limiter.acquire().await;

        let value = match self
            .backend
            .generate_structured(StructuredRequest {
                system: DEADLINE_SYSTEM.to_string(),
                prompt,
                temperature: defaults::DEADLINE_TEMPERATURE,
            })
            .await
        {
            Ok(value) => value,
            Err(e) => return Outcome::Degraded(e.to_string()),
        };

        match serde_json::from_value::<DeadlineFragment>(value) {
            Ok(fragment) => Outcome::Ok(fragment),
            Err(e) => Outcome::Degraded(format!("schema mismatch: {e}")),
        }
    }

    /// Turn a model answer into the final deadline, enforcing the
    /// deterministic urgency rules.
    fn resolve(fragment: DeadlineFragment, now: DateTime<Utc>) -> ExtractedDeadline {
        let confidence = clamp_confidence(fragment.confidence);

        if !fragment.has_deadline {
            return ExtractedDeadline {
                has_deadline: false,
                deadline: None,
                description: None,
                urgency: Urgency::parse_lenient(&fragment.urgency),
                confidence,
            };
        }

        let Some(deadline) = fragment.deadline.as_deref().and_then(normalize_deadline) else {
            // A date string that fails to parse to a valid calendar point is
            // discarded, never propagated as a malformed timestamp.
            debug!(
                subsystem = "pipeline",
                component = "deadline",
                raw = fragment.deadline.as_deref().unwrap_or(""),
                "Unparseable deadline date discarded"
            );
            return ExtractedDeadline::none();
        };

        // Once a concrete date exists, urgency is a function of time, not an
        // independent model judgment.
        let hours_until = (deadline - now).num_minutes() as f64 / 60.0;
        ExtractedDeadline {
            has_deadline: true,
            deadline: Some(deadline),
            description: fragment.description,
            urgency: Urgency::from_hours_until(hours_until),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_inference::MockInferenceBackend;

    fn extractor_with(mock: &MockInferenceBackend) -> DeadlineExtractor {
        DeadlineExtractor::new(
            Arc::new(mock.clone()),
            Arc::new(InferenceLimiter::new(10_000)),
        )
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_normalize_rfc3339() {
        let dt = normalize_deadline("2026-01-25T12:00:00Z").unwrap();
        assert_eq!(dt, at("2026-01-25T12:00:00Z"));
    }

    #[test]
    fn test_normalize_plain_date_is_end_of_day() {
        let dt = normalize_deadline("2026-01-25").unwrap();
        assert_eq!(dt, at("2026-01-25T23:59:59Z"));
    }

    #[test]
    fn test_normalize_long_form_date() {
        let dt = normalize_deadline("January 25, 2026").unwrap();
        assert_eq!(dt.date_naive().to_string(), "2026-01-25");
    }

    #[test]
    fn test_normalize_garbage_is_none() {
        assert_eq!(normalize_deadline("next Tuesday-ish"), None);
        assert_eq!(normalize_deadline(""), None);
        assert_eq!(normalize_deadline("2026-13-45"), None);
    }

    #[tokio::test]
    async fn test_capability_failure_returns_inert_default() {
        let mock = MockInferenceBackend::new().failing();
        let extractor = extractor_with(&mock);
        let result = extractor.extract("anything", None, Utc::now()).await;
        assert_eq!(result, ExtractedDeadline::none());
        assert!(!result.has_deadline);
        assert_eq!(result.urgency, Urgency::Low);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_malformed_schema_returns_inert_default() {
        let mock = MockInferenceBackend::new()
            .with_default_response(serde_json::json!({"has_deadline": "definitely maybe"}));
        let extractor = extractor_with(&mock);
        let result = extractor.extract("anything", None, Utc::now()).await;
        assert_eq!(result, ExtractedDeadline::none());
    }

    #[tokio::test]
    async fn test_internship_scenario_far_out_is_low() {
        // "today" fixed well before the deadline: urgency derives purely
        // from the day count, overriding the model's own label.
        let mock = MockInferenceBackend::new().with_default_response(serde_json::json!({
            "has_deadline": true,
            "deadline": "2026-01-25",
            "description": "Application deadline",
            "urgency": "critical",
            "confidence": 0.9
        }));
        let extractor = extractor_with(&mock);

        let now = at("2025-12-01T00:00:00Z");
        let result = extractor
            .extract(
                "Google Summer Internship — Applications due January 25, 2026",
                None,
                now,
            )
            .await;

        assert!(result.has_deadline);
        let deadline = result.deadline.unwrap();
        assert_eq!(deadline.date_naive().to_string(), "2026-01-25");
        assert_eq!(result.urgency, Urgency::Low);
        assert_eq!(result.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_near_deadline_is_critical() {
        let mock = MockInferenceBackend::new().with_default_response(serde_json::json!({
            "has_deadline": true,
            "deadline": "2026-01-25T12:00:00Z",
            "urgency": "low",
            "confidence": 0.8
        }));
        let extractor = extractor_with(&mock);

        let now = at("2026-01-25T02:00:00Z");
        let result = extractor.extract("due soon", None, now).await;
        assert_eq!(result.urgency, Urgency::Critical);
    }

    #[tokio::test]
    async fn test_unparseable_date_treated_as_no_deadline() {
        let mock = MockInferenceBackend::new().with_default_response(serde_json::json!({
            "has_deadline": true,
            "deadline": "sometime in spring",
            "urgency": "high",
            "confidence": 0.7
        }));
        let extractor = extractor_with(&mock);
        let result = extractor.extract("vague", None, Utc::now()).await;
        assert_eq!(result, ExtractedDeadline::none());
    }

    #[tokio::test]
    async fn test_no_deadline_keeps_normalized_label() {
        let mock = MockInferenceBackend::new().with_default_response(serde_json::json!({
            "has_deadline": false,
            "urgency": "somewhat-urgent",
            "confidence": 1.8
        }));
        let extractor = extractor_with(&mock);
        let result = extractor.extract("nothing due", None, Utc::now()).await;
        assert!(!result.has_deadline);
        // Unknown label normalizes to low; confidence clamps into range
        assert_eq!(result.urgency, Urgency::Low);
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_uses_low_temperature() {
        let mock = MockInferenceBackend::new();
        let extractor = extractor_with(&mock);
        let _ = extractor.extract("content", None, Utc::now()).await;
        let calls = mock.calls();
        assert_eq!(calls[0].temperature, defaults::DEADLINE_TEMPERATURE);
        assert!(calls[0].system.contains("deadline"));
    }
}
