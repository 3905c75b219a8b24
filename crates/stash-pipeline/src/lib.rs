//! # stash-pipeline
//!
//! Asynchronous content-processing pipeline for the stash engine.
//!
//! This crate wires the durable job queue to the per-capture processing
//! sequence: content-type-specific extraction, structured analysis,
//! deadline derivation, action planning, and idempotent action execution.
//! The pipeline degrades gracefully whenever the inference capability is
//! slow, unavailable, or returns malformed output.
//!
//! ## Example
//!
//! ```ignore
//! use stash_pipeline::{WorkerBuilder, WorkerConfig, CaptureProcessingHandler};
//!
//! let worker = WorkerBuilder::new(jobs)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(CaptureProcessingHandler::new(coordinator))
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod analyzer;
pub mod collection_match;
pub mod deadline;
pub mod executor;
pub mod extractors;
pub mod handler;
pub mod handlers;
pub mod ingest;
pub mod notify;
pub mod planner;
pub mod worker;

// Re-export core types
pub use stash_core::*;

pub use analyzer::{Analyzer, AnalysisFragment};
pub use collection_match::CollectionMatcher;
pub use deadline::DeadlineExtractor;
pub use executor::{Coordinator, CoordinatorDeps};
pub use extractors::{
    ContentExtractor, ExtractorRegistry, LinkExtractor, PdfExtractor, TextExtractor,
    VideoExtractor,
};
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use handlers::{CaptureProcessingHandler, ReminderSendingHandler};
pub use ingest::{IngestionGateway, WebhookIngest};
pub use notify::{NotificationDispatcher, NotificationTransport, PushTransport};
pub use planner::Planner;
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
