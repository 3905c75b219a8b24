//! Video extractor: resolves a platform video id and analyzes its transcript.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use stash_core::{
    defaults, Capture, ContentType, DeepAnalysis, Error, ExtractionFailure, Outcome, Result,
};

use super::ContentExtractor;
use crate::analyzer::Analyzer;

/// Resolve an 11-character video id from the URL shapes users paste:
/// canonical watch URLs, short links, shorts, embeds, `/v/` paths, or a
/// bare id.
pub fn resolve_video_id(input: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            Regex::new(
                r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/shorts/)([A-Za-z0-9_-]{11})",
            )
            .expect("valid regex"),
            Regex::new(r"youtube\.com/embed/([A-Za-z0-9_-]{11})").expect("valid regex"),
            Regex::new(r"youtube\.com/v/([A-Za-z0-9_-]{11})").expect("valid regex"),
        ]
    });

    let input = input.trim();
    for pattern in patterns {
        if let Some(captures) = pattern.captures(input) {
            return Some(captures[1].to_string());
        }
    }

    // Bare 11-character id
    static BARE: OnceLock<Regex> = OnceLock::new();
    let bare = BARE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));
    if bare.is_match(input) {
        return Some(input.to_string());
    }

    None
}

/// Parse transcript cue markup (XML/VTT/SRT shapes) into plain text.
///
/// Strips tags and timestamps, drops cue numbers and the WEBVTT header,
/// unescapes the common entities, and collapses whitespace.
pub fn parse_transcript_text(raw: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    static WEBVTT: OnceLock<Regex> = OnceLock::new();
    static CUE_NUMBER: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    let timestamp = TIMESTAMP.get_or_init(|| {
        Regex::new(r"\d{2}:\d{2}:\d{2}[,.]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[,.]\d{3}")
            .expect("valid regex")
    });
    let webvtt =
        WEBVTT.get_or_init(|| Regex::new(r"(?s)^WEBVTT.*?\n\n").expect("valid regex"));
    let cue_number =
        CUE_NUMBER.get_or_init(|| Regex::new(r"(?m)^\d+\s*$").expect("valid regex"));
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let text = webvtt.replace(raw, "");
    let text = tag.replace_all(&text, " ");
    let text = timestamp.replace_all(&text, "");
    let text = cue_number.replace_all(&text, "");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    space.replace_all(&text, " ").trim().to_string()
}

/// Extractor for video captures.
///
/// Fetches the transcript for the resolved video id, fails with
/// `NO_TRANSCRIPT` when none exists, and analyzes the concatenated
/// transcript text.
pub struct VideoExtractor {
    analyzer: Arc<Analyzer>,
    client: reqwest::Client,
    transcript_base: String,
}

impl VideoExtractor {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self::with_transcript_base(analyzer, "https://video.google.com/timedtext".to_string())
    }

    /// Override the transcript endpoint (used by tests).
    pub fn with_transcript_base(analyzer: Arc<Analyzer>, transcript_base: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            analyzer,
            client,
            transcript_base,
        }
    }

    /// Fetch and flatten the transcript for a video id.
    async fn fetch_transcript(&self, video_id: &str) -> Result<String> {
        let url = format!("{}?lang=en&v={}", self.transcript_base, video_id);
        let response = self.client.get(&url).send().await.map_err(|e| {
            Error::extraction(ExtractionFailure::FetchFailed, format!("Fetch failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(Error::extraction(
                ExtractionFailure::FetchFailed,
                format!("HTTP {} fetching transcript", response.status()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            Error::extraction(ExtractionFailure::FetchFailed, format!("Body read failed: {e}"))
        })?;

        let text = parse_transcript_text(&body);
        if text.is_empty() {
            return Err(Error::extraction(
                ExtractionFailure::NoTranscript,
                format!("No transcript available for video {video_id}"),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl ContentExtractor for VideoExtractor {
    fn content_type(&self) -> ContentType {
        ContentType::Video
    }

    async fn extract(&self, capture: &Capture) -> Result<DeepAnalysis> {
        let video_id = resolve_video_id(&capture.content).ok_or_else(|| {
            Error::extraction(
                ExtractionFailure::ParseFailed,
                format!("Could not resolve a video id from: {}", capture.content),
            )
        })?;

        let transcript = self.fetch_transcript(&video_id).await?;

        debug!(
            subsystem = "pipeline",
            component = "video_extractor",
            capture_id = %capture.id,
            video_id = %video_id,
            chars = transcript.len(),
            "Transcript fetched"
        );

        let outcome = self
            .analyzer
            .analyze(&transcript, capture.context.as_deref())
            .await;

        Ok(match outcome {
            Outcome::Ok(fragment) => fragment.into_analysis(transcript, "Video"),
            Outcome::Degraded(reason) => {
                warn!(
                    subsystem = "pipeline",
                    component = "video_extractor",
                    capture_id = %capture.id,
                    reason = %reason,
                    degraded = true,
                    "Analyzer degraded, substituting stub"
                );
                DeepAnalysis::degraded_stub_with_text(ContentType::Video, transcript)
            }
        })
    }

    fn name(&self) -> &str {
        "video"
    }
}
