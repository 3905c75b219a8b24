//! Link extractor: classifies a URL and delegates or analyzes the page.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use stash_core::{
    defaults, Capture, ContentType, DeepAnalysis, Error, ExtractionFailure, Outcome, Result,
};

use super::video::resolve_video_id;
use super::{ContentExtractor, PdfExtractor, VideoExtractor};
use crate::analyzer::Analyzer;

/// Where a URL should be routed after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    Pdf,
    Video,
    Page,
}

/// Classify a URL before fetching anything.
///
/// The path extension and recognizable video URL shapes are enough for most
/// links; ambiguous URLs are fetched as pages and re-routed when the
/// response turns out to be a PDF.
pub fn classify_url(url: &Url) -> LinkClass {
    if resolve_video_id(url.as_str()).is_some() {
        return LinkClass::Video;
    }
    if url.path().to_lowercase().ends_with(".pdf") {
        return LinkClass::Pdf;
    }
    LinkClass::Page
}

/// Extract the contents of the `<title>` element, if present.
pub fn extract_html_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let title =
        TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
    title.captures(html).map(|c| {
        c[1].trim()
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
    })
}

/// Reduce an HTML document to readable text.
///
/// Drops script/style blocks, strips tags, unescapes the common entities,
/// and collapses whitespace. Crude, but the analyzer only needs the prose.
pub fn strip_html(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
            .expect("valid regex")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let text = script.replace_all(html, " ");
    let text = tag.replace_all(&text, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    space.replace_all(&text, " ").trim().to_string()
}

/// Extractor for link captures (and webhook payloads carrying a URL).
///
/// Classifies the URL further (PDF vs. video vs. generic page) before
/// delegating to the matching extractor or analyzing the page text itself.
pub struct LinkExtractor {
    analyzer: Arc<Analyzer>,
    client: reqwest::Client,
    pdf: Arc<PdfExtractor>,
    video: Arc<VideoExtractor>,
}

impl LinkExtractor {
    pub fn new(
        analyzer: Arc<Analyzer>,
        pdf: Arc<PdfExtractor>,
        video: Arc<VideoExtractor>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            analyzer,
            client,
            pdf,
            video,
        }
    }

    async fn extract_page(&self, capture: &Capture, url: &Url) -> Result<DeepAnalysis> {
        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            Error::extraction(ExtractionFailure::FetchFailed, format!("Fetch failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(Error::extraction(
                ExtractionFailure::FetchFailed,
                format!("HTTP {} fetching {url}", response.status()),
            ));
        }

        // Some PDFs hide behind extension-less URLs; re-route on content type
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.starts_with("application/pdf") {
            debug!(
                subsystem = "pipeline",
                component = "link_extractor",
                capture_id = %capture.id,
                "URL served a PDF, delegating"
            );
            return self.pdf.extract(capture).await;
        }

        let html = response.text().await.map_err(|e| {
            Error::extraction(ExtractionFailure::FetchFailed, format!("Body read failed: {e}"))
        })?;

        let page_title = extract_html_title(&html);
        let text = strip_html(&html);
        if text.is_empty() {
            return Err(Error::extraction(
                ExtractionFailure::EmptyExtraction,
                format!("No readable text at {url}"),
            ));
        }

        let outcome = self
            .analyzer
            .analyze(&text, capture.context.as_deref())
            .await;

        let fallback_title = page_title.as_deref().unwrap_or("Saved Link");
        Ok(match outcome {
            Outcome::Ok(fragment) => fragment.into_analysis(text, fallback_title),
            Outcome::Degraded(reason) => {
                warn!(
                    subsystem = "pipeline",
                    component = "link_extractor",
                    capture_id = %capture.id,
                    reason = %reason,
                    degraded = true,
                    "Analyzer degraded, substituting stub"
                );
                let mut stub = DeepAnalysis::degraded_stub_with_text(ContentType::Link, text);
                if let Some(title) = page_title {
                    stub.title = title;
                }
                stub
            }
        })
    }
}

#[async_trait]
impl ContentExtractor for LinkExtractor {
    fn content_type(&self) -> ContentType {
        ContentType::Link
    }

    async fn extract(&self, capture: &Capture) -> Result<DeepAnalysis> {
        let url = Url::parse(capture.content.trim()).map_err(|e| {
            Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("Invalid URL {:?}: {e}", capture.content),
            )
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("Unsupported URL scheme: {}", url.scheme()),
            ));
        }

        match classify_url(&url) {
            LinkClass::Video => self.video.extract(capture).await,
            LinkClass::Pdf => self.pdf.extract(capture).await,
            LinkClass::Page => self.extract_page(capture, &url).await,
        }
    }

    fn name(&self) -> &str {
        "link"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pdf_url() {
        let url = Url::parse("https://example.com/papers/attention.PDF").unwrap();
        assert_eq!(classify_url(&url), LinkClass::Pdf);
    }

    #[test]
    fn test_classify_video_url() {
        let url = Url::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(classify_url(&url), LinkClass::Video);
    }

    #[test]
    fn test_classify_generic_page() {
        let url = Url::parse("https://example.com/blog/post").unwrap();
        assert_eq!(classify_url(&url), LinkClass::Page);
    }

    #[test]
    fn test_extract_html_title() {
        let html = "<html><head><title> My &amp; Page </title></head><body></body></html>";
        assert_eq!(extract_html_title(html), Some("My & Page".to_string()));
    }

    #[test]
    fn test_extract_html_title_missing() {
        assert_eq!(extract_html_title("<html><body>no title</body></html>"), None);
    }

    #[test]
    fn test_strip_html_drops_scripts_and_tags() {
        let html = r#"<html><head><style>body { color: red; }</style>
<script>alert("hi");</script></head>
<body><h1>Header</h1><p>Some &amp; text</p></body></html>"#;
        assert_eq!(strip_html(html), "Header Some & text");
    }

    #[test]
    fn test_strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("just words"), "just words");
    }
}
