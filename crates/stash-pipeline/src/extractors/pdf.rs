//! PDF extractor: fetches the document and extracts text via `pdftotext`.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use stash_core::{
    defaults, Capture, ContentType, DeepAnalysis, Error, ExtractionFailure, Outcome, Result,
};

use super::ContentExtractor;
use crate::analyzer::Analyzer;

/// Extractor for PDF captures.
///
/// Fetches the resource, validates the `%PDF` magic, extracts raw text with
/// `pdftotext` (poppler-utils) guarded by a per-command timeout, and fails
/// with `EXTRACTION_EMPTY` when the text layer is too thin to be useful
/// (scanned/unreadable documents). Text is truncated before analysis to
/// bound downstream cost.
pub struct PdfExtractor {
    analyzer: Arc<Analyzer>,
    client: reqwest::Client,
}

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("External command timed out after {timeout_secs}s"),
            )
        })?
        .map_err(|e| {
            Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("Failed to execute command: {e}"),
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::extraction(
            ExtractionFailure::ParseFailed,
            format!("Command failed (exit {}): {}", output.status, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl PdfExtractor {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self { analyzer, client }
    }

    /// Fetch the PDF bytes from the capture's URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            Error::extraction(ExtractionFailure::FetchFailed, format!("Fetch failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(Error::extraction(
                ExtractionFailure::FetchFailed,
                format!("HTTP {} fetching {url}", response.status()),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            Error::extraction(ExtractionFailure::FetchFailed, format!("Body read failed: {e}"))
        })?;

        Ok(bytes.to_vec())
    }

    /// Extract raw text from PDF bytes.
    pub(crate) async fn extract_text(&self, data: &[u8]) -> Result<String> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            // Fall back to magic-byte sniffing for PDFs behind redirects
            // that prepend a BOM or whitespace
            let is_pdf = infer::get(data)
                .map(|kind| kind.mime_type() == "application/pdf")
                .unwrap_or(false);
            if !is_pdf {
                return Err(Error::extraction(
                    ExtractionFailure::ParseFailed,
                    "Resource is not a valid PDF (missing %PDF header)",
                ));
            }
        }

        // pdftotext reads from a file path
        let mut tmpfile = NamedTempFile::new().map_err(|e| {
            Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("Failed to create temp file: {e}"),
            )
        })?;
        tmpfile.write_all(data).map_err(|e| {
            Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("Failed to write temp file: {e}"),
            )
        })?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let text = run_cmd_with_timeout(
            Command::new("pdftotext").arg(&tmp_path).arg("-"),
            defaults::EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        let trimmed_len = text.trim().len();
        if trimmed_len < defaults::MIN_PDF_TEXT_LEN {
            return Err(Error::extraction(
                ExtractionFailure::EmptyExtraction,
                format!(
                    "Extracted only {trimmed_len} chars (minimum {})",
                    defaults::MIN_PDF_TEXT_LEN
                ),
            ));
        }

        Ok(text)
    }

    /// Check whether `pdftotext` is installed.
    pub async fn health_check(&self) -> bool {
        match Command::new("pdftotext").arg("-v").output().await {
            // pdftotext -v exits 0 or 99 depending on version; both mean
            // the binary exists
            Ok(output) => output.status.success() || output.status.code() == Some(99),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ContentExtractor for PdfExtractor {
    fn content_type(&self) -> ContentType {
        ContentType::Pdf
    }

    async fn extract(&self, capture: &Capture) -> Result<DeepAnalysis> {
        let url = capture.content.trim();
        let data = self.fetch(url).await?;
        let text = self.extract_text(&data).await?;

        debug!(
            subsystem = "pipeline",
            component = "pdf_extractor",
            capture_id = %capture.id,
            chars = text.len(),
            "PDF text extracted"
        );

        let outcome = self
            .analyzer
            .analyze(&text, capture.context.as_deref())
            .await;

        Ok(match outcome {
            Outcome::Ok(fragment) => fragment.into_analysis(text, "PDF Document"),
            Outcome::Degraded(reason) => {
                warn!(
                    subsystem = "pipeline",
                    component = "pdf_extractor",
                    capture_id = %capture.id,
                    reason = %reason,
                    degraded = true,
                    "Analyzer degraded, substituting stub"
                );
                DeepAnalysis::degraded_stub_with_text(ContentType::Pdf, text)
            }
        })
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_inference::{InferenceLimiter, MockInferenceBackend};

    fn extractor() -> PdfExtractor {
        PdfExtractor::new(Arc::new(Analyzer::new(
            Arc::new(MockInferenceBackend::new()),
            Arc::new(InferenceLimiter::new(10_000)),
        )))
    }

    #[tokio::test]
    async fn test_extract_text_rejects_non_pdf_bytes() {
        let err = extractor()
            .extract_text(b"this is not a pdf at all")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PARSE_FAILED"));
    }

    #[tokio::test]
    async fn test_extract_text_rejects_empty_input() {
        let err = extractor().extract_text(b"").await.unwrap_err();
        assert!(err.to_string().contains("PARSE_FAILED"));
    }

    #[tokio::test]
    async fn test_fetch_404_is_fetch_failure() {
        // Port 9 (discard) refuses connections on any sane test host
        let err = extractor()
            .fetch("http://127.0.0.1:9/missing.pdf")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FETCH_FAILED"));
    }
}
