//! Content extractors: one per capture type, dispatched through a registry.
//!
//! Each extractor turns a capture's source into a [`DeepAnalysis`], doing
//! whatever network I/O its content type requires. Extraction failures are
//! recovered at the registry boundary by substituting a degraded stub;
//! they never abort the pipeline.

pub mod link;
pub mod pdf;
pub mod text;
pub mod video;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use stash_core::{Capture, ContentType, DeepAnalysis, Result};

pub use link::LinkExtractor;
pub use pdf::PdfExtractor;
pub use text::TextExtractor;
pub use video::VideoExtractor;

/// Extractor for one content type.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// The content type this extractor handles.
    fn content_type(&self) -> ContentType;

    /// Extract and analyze the capture's content.
    ///
    /// Errors are recovered by the registry; implementations should fail
    /// with a typed [`stash_core::Error::Extraction`] where possible so the
    /// machine-readable code lands in the logs.
    async fn extract(&self, capture: &Capture) -> Result<DeepAnalysis>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}

/// Registry mapping content types to their extractor implementations.
pub struct ExtractorRegistry {
    extractors: HashMap<ContentType, Arc<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor under its own content type.
    pub fn register(&mut self, extractor: Arc<dyn ContentExtractor>) {
        self.extractors.insert(extractor.content_type(), extractor);
    }

    /// Register an extractor for an additional content type (e.g. the text
    /// extractor also serving document captures).
    pub fn register_as(&mut self, content_type: ContentType, extractor: Arc<dyn ContentExtractor>) {
        self.extractors.insert(content_type, extractor);
    }

    /// Check if an extractor is registered for the given type.
    pub fn has_extractor(&self, content_type: ContentType) -> bool {
        self.extractors.contains_key(&content_type)
    }

    /// Content types with registered extractors.
    pub fn available_types(&self) -> Vec<ContentType> {
        self.extractors.keys().copied().collect()
    }

    /// Extract the capture, substituting the degraded stub on any failure.
    ///
    /// A missing extractor for a known type is treated the same way as a
    /// failed extraction: the capture still flows through the pipeline.
    pub async fn extract_or_stub(&self, capture: &Capture) -> DeepAnalysis {
        let Some(extractor) = self.extractors.get(&capture.content_type) else {
            warn!(
                subsystem = "pipeline",
                component = "extractors",
                capture_id = %capture.id,
                content_type = capture.content_type.as_str(),
                "No extractor registered, substituting degraded stub"
            );
            return DeepAnalysis::degraded_stub(capture.content_type);
        };

        match extractor.extract(capture).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "extractors",
                    capture_id = %capture.id,
                    extractor = extractor.name(),
                    error = %e,
                    degraded = true,
                    "Extraction failed, substituting degraded stub"
                );
                DeepAnalysis::degraded_stub(capture.content_type)
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stash_core::Error;
    use uuid::Uuid;

    struct FailingExtractor;

    #[async_trait]
    impl ContentExtractor for FailingExtractor {
        fn content_type(&self) -> ContentType {
            ContentType::Pdf
        }

        async fn extract(&self, _capture: &Capture) -> Result<DeepAnalysis> {
            Err(Error::extraction(
                stash_core::ExtractionFailure::FetchFailed,
                "HTTP 404",
            ))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn capture(content_type: ContentType) -> Capture {
        Capture {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content_type,
            content: "https://example.com/file.pdf".to_string(),
            context: None,
            metadata: serde_json::json!({}),
            status: stash_core::CaptureStatus::Processing,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_extractor_yields_stub() {
        let registry = ExtractorRegistry::new();
        let analysis = registry.extract_or_stub(&capture(ContentType::Image)).await;
        assert!(analysis.degraded);
        assert_eq!(analysis.title, "Image");
    }

    #[tokio::test]
    async fn test_failed_extraction_yields_stub() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(FailingExtractor));

        let analysis = registry.extract_or_stub(&capture(ContentType::Pdf)).await;
        assert!(analysis.degraded);
        assert_eq!(analysis.title, "PDF Document");
        assert!(analysis.topics.is_empty());
        assert!(analysis.entities.is_empty());
    }

    #[test]
    fn test_register_as_covers_extra_types() {
        let mut registry = ExtractorRegistry::new();
        let extractor: Arc<dyn ContentExtractor> = Arc::new(FailingExtractor);
        registry.register(extractor.clone());
        registry.register_as(ContentType::Document, extractor);

        assert!(registry.has_extractor(ContentType::Pdf));
        assert!(registry.has_extractor(ContentType::Document));
        assert!(!registry.has_extractor(ContentType::Audio));
    }
}
