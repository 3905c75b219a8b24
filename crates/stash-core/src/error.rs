//! Error types for the stash engine.

use thiserror::Error;

/// Result type alias using the stash engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable codes for content extraction failures.
///
/// These codes are stable identifiers surfaced in logs and job error
/// messages; the pipeline itself recovers from all of them by substituting
/// a degraded analysis stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Fetching the source resource failed (network, HTTP status).
    FetchFailed,
    /// The fetched resource could not be parsed.
    ParseFailed,
    /// Extraction produced text below the minimum usable length.
    EmptyExtraction,
    /// A video source has no transcript available.
    NoTranscript,
}

impl ExtractionFailure {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FetchFailed => "FETCH_FAILED",
            Self::ParseFailed => "PARSE_FAILED",
            Self::EmptyExtraction => "EXTRACTION_EMPTY",
            Self::NoTranscript => "NO_TRANSCRIPT",
        }
    }
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Core error type for stash engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capture not found
    #[error("Capture not found: {0}")]
    CaptureNotFound(uuid::Uuid),

    /// User not found (ingestion rejects unknown user identifiers)
    #[error("User not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// Content extraction failed with a machine-readable code
    #[error("Extraction failed ({code}): {message}")]
    Extraction {
        code: ExtractionFailure,
        message: String,
    },

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Notification dispatch failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// A push registration was revoked by the transport and must be removed
    #[error("Stale device registration: {0}")]
    StaleRegistration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an extraction failure with a code and message.
    pub fn extraction(code: ExtractionFailure, message: impl Into<String>) -> Self {
        Error::Extraction {
            code,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
