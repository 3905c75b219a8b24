//! Default configuration values for the stash engine.
//!
//! Every constant here can be overridden by an environment variable at the
//! construction site that uses it (see the `from_env` constructors); these
//! are the values used when nothing is configured.

/// Default polling interval for the job worker when the queue is empty (ms).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum number of concurrently processed jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Hard per-job timeout in seconds. A hung external call must not starve
/// the worker pool indefinitely.
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// Ceiling on any computed retry backoff delay.
pub const MAX_BACKOFF_SECS: u64 = 3600;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Maximum characters of extracted text handed to the analyzer.
/// Bounds inference cost and latency on large documents.
pub const ANALYSIS_INPUT_BUDGET: usize = 6_000;

/// Minimum extracted PDF text length; below this the document is treated as
/// scanned/unreadable (`EXTRACTION_EMPTY`).
pub const MIN_PDF_TEXT_LEN: usize = 120;

/// Timeout for fetching remote resources during extraction (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Timeout for external extraction commands such as `pdftotext` (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Confidence assigned to the planner's heuristic fallback plan.
///
/// Fixed and lower than a typical successful model-derived plan so
/// downstream consumers can tell the plan is heuristic, not model-reasoned.
pub const FALLBACK_PLAN_CONFIDENCE: f32 = 0.6;

/// How far out the fallback plan schedules its reminder (seconds).
pub const FALLBACK_REMINDER_DELAY_SECS: i64 = 3600;

/// Sampling temperature for general content analysis.
pub const ANALYSIS_TEMPERATURE: f32 = 0.7;

/// Sampling temperature for deadline extraction (favors consistency).
pub const DEADLINE_TEMPERATURE: f32 = 0.1;

/// Sampling temperature for action planning.
pub const PLANNER_TEMPERATURE: f32 = 0.4;

/// Default inference requests allowed per minute (per process).
pub const INFERENCE_REQUESTS_PER_MINUTE: u32 = 60;

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "qwen3:8b";

/// Default embedding model.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Cosine similarity above which an existing collection is reused instead
/// of creating a new one.
pub const COLLECTION_MATCH_THRESHOLD: f32 = 0.80;

/// Timeout for a single push delivery attempt (seconds).
pub const PUSH_TIMEOUT_SECS: u64 = 10;
