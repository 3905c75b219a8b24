//! Job worker runtime: claims jobs from the queue and runs them concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use stash_core::{defaults, Job, JobKind, JobRepository, Result};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Hard per-job timeout in seconds.
    pub job_timeout_secs: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `JOB_TIMEOUT_SECS` | `300` | Per-job timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_POLL_INTERVAL_MS);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            job_timeout_secs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, kind: JobKind },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, kind: JobKind },
    /// A job attempt failed (the queue decides whether it retries).
    JobFailed {
        job_id: Uuid,
        kind: JobKind,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully. In-flight jobs drain
    /// before the worker loop exits.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| stash_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Job worker that processes jobs from the queue.
pub struct JobWorker {
    jobs: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker over the given queue.
    pub fn new(jobs: Arc<dyn JobRepository>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            jobs,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for a job kind.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let kind = handler.kind();
        let mut handlers = self.handlers.write().await;
        handlers.insert(kind, Arc::new(handler));
        debug!(job_kind = kind.as_str(), "Registered job handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent job processing.
    ///
    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Only sleeps when the queue is empty.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Job worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_jobs;

        loop {
            // Check for shutdown before claiming jobs
            if shutdown_rx.try_recv().is_ok() {
                info!("Job worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let worker = self.clone_refs();
                        tasks.spawn(async move {
                            worker.execute_job(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Queue empty — sleep before polling again
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent job batch");
                // Drain the batch before claiming more
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    /// Claim the next due job for a kind we have a handler for.
    async fn claim_job(&self) -> Option<Job> {
        let kinds: Vec<JobKind> = {
            let handlers = self.handlers.read().await;
            handlers.keys().copied().collect()
        };

        if kinds.is_empty() {
            return None;
        }

        match self.jobs.claim_next(&kinds).await {
            Ok(Some(job)) => Some(job),
            Ok(None) => None,
            Err(e) => {
                error!(error = ?e, "Failed to claim job");
                None
            }
        }
    }

    /// Clone references needed for spawned job tasks.
    fn clone_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            jobs: self.jobs.clone(),
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Get the pending job count.
    pub async fn pending_count(&self) -> Result<i64> {
        self.jobs.pending_count().await
    }
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    jobs: Arc<dyn JobRepository>,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    job_timeout: Duration,
}

impl JobWorkerRef {
    /// Execute a single claimed job.
    async fn execute_job(self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let kind = job.kind;

        info!(
            job_id = %job_id,
            job_kind = kind.as_str(),
            attempt = job.attempts + 1,
            "Processing job"
        );

        let _ = self.event_tx.send(WorkerEvent::JobStarted { job_id, kind });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&kind).cloned()
        };

        let result = match handler {
            Some(handler) => {
                let ctx = JobContext::new(job);
                match tokio::time::timeout(self.job_timeout, handler.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            job_id = %job_id,
                            job_kind = kind.as_str(),
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        );
                        JobResult::Failed(format!(
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        ))
                    }
                }
            }
            None => {
                warn!(job_kind = kind.as_str(), "No handler registered for job kind");
                JobResult::Failed(format!("No handler for job kind: {}", kind.as_str()))
            }
        };

        match result {
            JobResult::Success(result_data) => {
                if let Err(e) = self.jobs.complete(job_id, result_data).await {
                    error!(error = ?e, job_id = %job_id, "Failed to mark job as completed");
                } else {
                    info!(
                        job_id = %job_id,
                        job_kind = kind.as_str(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::JobCompleted { job_id, kind });
                }
            }
            JobResult::Failed(error) => {
                if let Err(e) = self.jobs.fail(job_id, &error).await {
                    error!(error = ?e, job_id = %job_id, "Failed to mark job as failed");
                } else {
                    warn!(
                        job_id = %job_id,
                        job_kind = kind.as_str(),
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        kind,
                        error,
                    });
                }
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    jobs: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            jobs,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.jobs, self.config);

        for handler in self.handlers {
            let kind = handler.kind();
            let mut handlers = worker.handlers.write().await;
            handlers.insert(kind, Arc::from(handler));
        }

        worker
    }
}
