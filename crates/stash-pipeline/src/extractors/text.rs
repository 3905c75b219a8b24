//! Text extractor for plain text, documents, and webhook bodies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use stash_core::{Capture, ContentType, DeepAnalysis, Outcome, Result};

use super::ContentExtractor;
use crate::analyzer::Analyzer;

/// Extractor for captures whose content is already text.
///
/// Also registered for document and other captures; the body goes straight
/// to the analyzer.
pub struct TextExtractor {
    analyzer: Arc<Analyzer>,
}

impl TextExtractor {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl ContentExtractor for TextExtractor {
    fn content_type(&self) -> ContentType {
        ContentType::Text
    }

    async fn extract(&self, capture: &Capture) -> Result<DeepAnalysis> {
        let text = capture.content.trim();

        let outcome = self
            .analyzer
            .analyze(text, capture.context.as_deref())
            .await;

        Ok(match outcome {
            Outcome::Ok(fragment) => fragment.into_analysis(text.to_string(), "Note"),
            Outcome::Degraded(reason) => {
                warn!(
                    subsystem = "pipeline",
                    component = "text_extractor",
                    capture_id = %capture.id,
                    reason = %reason,
                    degraded = true,
                    "Analyzer degraded, substituting stub"
                );
                DeepAnalysis::degraded_stub_with_text(capture.content_type, text.to_string())
            }
        })
    }

    fn name(&self) -> &str {
        "text"
    }
}
