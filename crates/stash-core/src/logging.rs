//! Structured logging field name constants for the stash engine.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "pipeline", "db", "inference", "notify", "ingest"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "planner", "pdf_extractor", "pool", "dispatcher"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "process_capture", "claim_next", "generate_structured"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Capture UUID being operated on.
pub const CAPTURE_ID: &str = "capture_id";

/// Owning user UUID.
pub const USER_ID: &str = "user_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job kind string.
pub const JOB_KIND: &str = "job_kind";

/// Reminder UUID being sent.
pub const REMINDER_ID: &str = "reminder_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of actions in a plan.
pub const ACTION_COUNT: &str = "action_count";

/// Byte length of a prompt or extracted text.
pub const PROMPT_LEN: &str = "prompt_len";

/// Number of the current retry attempt.
pub const ATTEMPT: &str = "attempt";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// True when a degraded fallback was substituted.
pub const DEGRADED: &str = "degraded";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
