//! Content analyzer: structured understanding via the inference capability.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};

use stash_core::{
    defaults, DeepAnalysis, Difficulty, EntityMap, Outcome, StructuredInference,
    StructuredRequest,
};
use stash_inference::InferenceLimiter;

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The fixed result shape the analyzer asks the model for.
///
/// Every field is defaulted so a partially-conforming answer still parses;
/// a completely malformed answer degrades instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisFragment {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content_kind: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub entities: EntityMap,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub estimated_minutes: u32,
}

impl AnalysisFragment {
    /// Merge this fragment with the extracted text into a full analysis.
    ///
    /// `fallback_title` is used when the model returned an empty title.
    pub fn into_analysis(self, full_text: String, fallback_title: &str) -> DeepAnalysis {
        let title = if self.title.trim().is_empty() {
            fallback_title.to_string()
        } else {
            self.title.trim().to_string()
        };
        DeepAnalysis {
            title,
            description: self.description.trim().to_string(),
            full_text,
            content_kind: self.content_kind.trim().to_lowercase(),
            topics: self
                .topics
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            entities: self.entities,
            key_takeaways: self.key_takeaways,
            action_items: self.action_items,
            detected_dates: self.dates,
            difficulty: Difficulty::parse_lenient(&self.difficulty),
            // Sanity cap; some models return milliseconds or word counts here
            estimated_minutes: self.estimated_minutes.min(6000),
            degraded: false,
        }
    }
}

const ANALYZER_SYSTEM: &str = "You analyze saved content for a personal knowledge base. \
Respond with a single JSON object with these keys: \
title (string, short), description (string, 1-2 sentences), \
content_kind (string, one of: article, tutorial, job-posting, event, reference, \
entertainment, product, discussion, other), topics (array of strings), \
entities (object with people, organizations, technologies, locations arrays), \
key_takeaways (array of strings), action_items (array of strings), \
dates (array of date strings found verbatim in the content), \
difficulty (beginner|intermediate|advanced), estimated_minutes (number).";

/// Analyzer calling the structured-inference capability.
pub struct Analyzer {
    backend: Arc<dyn StructuredInference>,
    limiter: Arc<InferenceLimiter>,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn StructuredInference>, limiter: Arc<InferenceLimiter>) -> Self {
        Self { backend, limiter }
    }

    /// Analyze extracted text, constrained to the fixed result schema.
    ///
    /// Timeout, transport errors, and malformed answers all return
    /// [`Outcome::Degraded`]; the caller substitutes the degraded stub.
    pub async fn analyze(&self, text: &str, user_context: Option<&str>) -> Outcome<AnalysisFragment> {
        let start = Instant::now();
        let input = truncate_chars(text, defaults::ANALYSIS_INPUT_BUDGET);

        let mut prompt = String::new();
        if let Some(context) = user_context {
            if !context.trim().is_empty() {
                prompt.push_str(&format!("User note about why this was saved: {context}\n\n"));
            }
        }
        prompt.push_str("Content:\n");
        prompt.push_str(input);

        self.limiter.acquire().await;

        let result = self
            .backend
            .generate_structured(StructuredRequest {
                system: ANALYZER_SYSTEM.to_string(),
                prompt,
                temperature: defaults::ANALYSIS_TEMPERATURE,
            })
            .await;

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "analyzer",
                    model = self.backend.model_name(),
                    error = %e,
                    "Analysis call failed, degrading"
                );
                return Outcome::Degraded(e.to_string());
            }
        };

        match serde_json::from_value::<AnalysisFragment>(value) {
            Ok(fragment) => {
                debug!(
                    subsystem = "pipeline",
                    component = "analyzer",
                    prompt_len = input.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    topic_count = fragment.topics.len(),
                    "Analysis complete"
                );
                Outcome::Ok(fragment)
            }
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "analyzer",
                    error = %e,
                    "Analysis response did not match schema, degrading"
                );
                Outcome::Degraded(format!("schema mismatch: {e}"))
            }
        }
    }
}
