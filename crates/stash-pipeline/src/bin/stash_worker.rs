//! Worker runtime entry point.
//!
//! Owns the lifecycle of every shared component: connection pool, queue
//! client, inference backend, rate limiter, and the worker itself are
//! constructed here once and injected downward. Shutdown drains in-flight
//! jobs before exiting.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use stash_core::{
    CaptureRepository, CollectionRepository, DeviceRepository, EmbeddingBackend,
    InsightRepository, JobRepository, ReminderRepository, StructuredInference, TagRepository,
};
use stash_db::Database;
use stash_inference::{InferenceLimiter, OllamaBackend};
use stash_pipeline::{
    Analyzer, CaptureProcessingHandler, CollectionMatcher, Coordinator, CoordinatorDeps,
    DeadlineExtractor, ExtractorRegistry, LinkExtractor, NotificationDispatcher, PdfExtractor,
    Planner, PushTransport, ReminderSendingHandler, TextExtractor, VideoExtractor,
    WorkerBuilder, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let db = Database::connect(&database_url).await?;

    // Repositories as injected trait objects
    let captures: Arc<dyn CaptureRepository> = Arc::new(db.captures);
    let tags: Arc<dyn TagRepository> = Arc::new(db.tags);
    let collections: Arc<dyn CollectionRepository> = Arc::new(db.collections);
    let reminders: Arc<dyn ReminderRepository> = Arc::new(db.reminders);
    let insights: Arc<dyn InsightRepository> = Arc::new(db.insights);
    let devices: Arc<dyn DeviceRepository> = Arc::new(db.devices);
    let jobs: Arc<dyn JobRepository> = Arc::new(db.jobs);

    // Inference stack: one backend, one rate limiter, shared everywhere
    let backend = Arc::new(OllamaBackend::from_env());
    let structured: Arc<dyn StructuredInference> = backend.clone();
    let embedder: Arc<dyn EmbeddingBackend> = backend.clone();
    let limiter = Arc::new(InferenceLimiter::from_env());

    let analyzer = Arc::new(Analyzer::new(structured.clone(), limiter.clone()));
    let deadline = Arc::new(DeadlineExtractor::new(structured.clone(), limiter.clone()));
    let planner = Arc::new(Planner::new(structured, limiter));

    // Extractors, dispatched by capture type
    let pdf = Arc::new(PdfExtractor::new(analyzer.clone()));
    let video = Arc::new(VideoExtractor::new(analyzer.clone()));
    let link = Arc::new(LinkExtractor::new(
        analyzer.clone(),
        pdf.clone(),
        video.clone(),
    ));
    let text = Arc::new(TextExtractor::new(analyzer));

    let mut registry = ExtractorRegistry::new();
    registry.register(link);
    registry.register(pdf);
    registry.register(video);
    registry.register(text.clone());
    registry.register_as(stash_core::ContentType::Document, text.clone());
    registry.register_as(stash_core::ContentType::Other, text);

    let matcher = Arc::new(CollectionMatcher::new(
        collections.clone(),
        Some(embedder),
    ));

    let transport = PushTransport::from_env()
        .map(|t| Arc::new(t) as Arc<dyn stash_pipeline::NotificationTransport>);
    let dispatcher = Arc::new(NotificationDispatcher::new(devices, insights, transport));

    let coordinator = Arc::new(Coordinator::new(CoordinatorDeps {
        captures,
        tags,
        collections,
        reminders: reminders.clone(),
        jobs: jobs.clone(),
        matcher,
        dispatcher: dispatcher.clone(),
        extractors: Arc::new(registry),
        deadline,
        planner,
    }));

    let worker = WorkerBuilder::new(jobs)
        .with_config(WorkerConfig::from_env())
        .with_handler(CaptureProcessingHandler::new(coordinator))
        .with_handler(ReminderSendingHandler::new(reminders, dispatcher))
        .build()
        .await;

    let handle = worker.start();
    info!("stash-worker running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down, draining in-flight jobs");
    handle.shutdown().await?;

    Ok(())
}
