//! Worker pool implementation.
//!
//! Runs three kinds of background loops:
//! - Workers: dequeue a job, trigger its pipeline run, settle the delivery
//! - Reaper: return expired leases to the queue
//! - Monitor: poll the engine for outcomes of triggered runs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineError, OrchestrationEngine, PipelineRun};
use crate::job::{JobStatus, PipelineConf};
use crate::metrics;
use crate::queue::{Delivery, JobQueue, QueueError};
use crate::stages::RunState;

use super::config::WorkerConfig;
use super::types::{WorkerError, WorkerStatus};

/// Outcomes fetched per monitor pass.
const MONITOR_BATCH: usize = 100;

/// How long `stop` waits for loops to wind down.
const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Default)]
struct WorkerStats {
    active: AtomicU64,
    dispatched: AtomicU64,
    trigger_failures: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
}

/// Pool of workers that move jobs from the queue to the engine.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: Arc<dyn JobQueue>,
    engine: Arc<dyn OrchestrationEngine>,

    // Runtime state
    running: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new, stopped pool.
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn JobQueue>,
        engine: Arc<dyn OrchestrationEngine>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            queue,
            engine,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(WorkerStats::default()),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start the pool (spawns background tasks).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        info!(
            "Starting worker pool with {} workers on engine '{}'",
            self.config.concurrency,
            self.engine.name()
        );

        let mut handles = self.handles.lock().await;
        for worker_id in 0..self.config.concurrency {
            handles.push(self.spawn_worker(worker_id));
        }
        handles.push(self.spawn_reaper_loop());
        handles.push(self.spawn_monitor_loop());

        info!("Worker pool started");
    }

    /// Stop the pool gracefully.
    ///
    /// Workers finish the delivery they are triggering; blocked dequeues are
    /// abandoned without taking a job.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker pool not running");
            return;
        }

        info!("Stopping worker pool");

        // Signal shutdown to all loops
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        let joined = tokio::time::timeout(STOP_GRACE, futures::future::join_all(handles)).await;
        if joined.is_err() {
            warn!("Worker pool loops did not stop within {:?}", STOP_GRACE);
        }

        info!("Worker pool stopped");
    }

    /// Whether the pool is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get current pool status.
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.running.load(Ordering::Relaxed),
            workers: self.config.concurrency,
            active: self.stats.active.load(Ordering::Relaxed),
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            trigger_failures: self.stats.trigger_failures.load(Ordering::Relaxed),
            runs_succeeded: self.stats.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.stats.runs_failed.load(Ordering::Relaxed),
        }
    }

    /// Spawn one worker loop.
    fn spawn_worker(&self, worker_id: usize) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let engine = Arc::clone(&self.engine);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Worker {} started", worker_id);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Worker {} received shutdown signal", worker_id);
                        break;
                    }
                    delivery = queue.dequeue() => {
                        match delivery {
                            Ok(delivery) => {
                                stats.active.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = Self::process_delivery(
                                    &queue,
                                    &engine,
                                    &stats,
                                    &config,
                                    delivery,
                                ).await {
                                    warn!("Worker {}: {}", worker_id, e);
                                }
                                stats.active.fetch_sub(1, Ordering::Relaxed);
                            }
                            Err(QueueError::Closed) => {
                                debug!("Worker {}: queue closed", worker_id);
                                break;
                            }
                            Err(e) => {
                                error!("Worker {} failed to dequeue: {}", worker_id, e);
                                tokio::time::sleep(Duration::from_millis(config.reap_interval_ms)).await;
                            }
                        }
                    }
                }
                if !running.load(Ordering::Relaxed) {
                    break;
                }
            }
            debug!("Worker {} stopped", worker_id);
        })
    }

    /// Spawn the lease reaper loop.
    fn spawn_reaper_loop(&self) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_millis(self.config.reap_interval_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Lease reaper started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Lease reaper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match queue.reap_expired() {
                            Ok(outcome) if !outcome.is_empty() => {
                                info!(
                                    "Reaped leases: {} requeued, {} dead",
                                    outcome.requeued.len(),
                                    outcome.dead.len()
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Lease reaping failed: {}", e),
                        }
                    }
                }
            }
            info!("Lease reaper stopped");
        })
    }

    /// Spawn the run monitor loop.
    fn spawn_monitor_loop(&self) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let engine = Arc::clone(&self.engine);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_millis(self.config.monitor_interval_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Run monitor started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Run monitor received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::check_run_outcomes(&queue, &engine, &stats).await {
                            warn!("Run monitoring failed: {}", e);
                        }
                    }
                }
            }
            info!("Run monitor stopped");
        })
    }

    /// Trigger the run for one delivery and settle it.
    async fn process_delivery(
        queue: &Arc<dyn JobQueue>,
        engine: &Arc<dyn OrchestrationEngine>,
        stats: &WorkerStats,
        config: &WorkerConfig,
        delivery: Delivery,
    ) -> Result<(), WorkerError> {
        let job_id = delivery.job.id.clone();
        info!(
            "Processing job {} (delivery {})",
            job_id, delivery.attempt
        );

        let conf = delivery.job.conf();
        match Self::trigger_with_retry(engine, config, &conf).await {
            Ok(run) => {
                queue.attach_run(&job_id, &run.run_id)?;
                queue.ack(&job_id)?;
                stats.dispatched.fetch_add(1, Ordering::Relaxed);
                info!("Job {} dispatched as run {}", job_id, run.run_id);
                Ok(())
            }
            Err(e) => {
                stats.trigger_failures.fetch_add(1, Ordering::Relaxed);
                queue.fail(&job_id, &e.to_string())?;
                Err(e)
            }
        }
    }

    /// Trigger a run, retrying retryable failures with exponential backoff.
    async fn trigger_with_retry(
        engine: &Arc<dyn OrchestrationEngine>,
        config: &WorkerConfig,
        conf: &PipelineConf,
    ) -> Result<PipelineRun, WorkerError> {
        let max_attempts = config.retry.max_attempts.max(1);
        let timeout = Duration::from_secs(config.trigger_timeout_secs);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, engine.trigger(conf)).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout {
                    secs: config.trigger_timeout_secs,
                }),
            };

            match result {
                Ok(run) => {
                    metrics::TRIGGER_ATTEMPTS.with_label_values(&["success"]).inc();
                    return Ok(run);
                }
                Err(e) => {
                    let label = if matches!(e, EngineError::Timeout { .. }) {
                        "timeout"
                    } else {
                        "error"
                    };
                    metrics::TRIGGER_ATTEMPTS.with_label_values(&[label]).inc();

                    if !e.is_retryable() || attempt >= max_attempts {
                        return Err(WorkerError::TriggerFailed {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    let delay = config.retry.delay_for(attempt);
                    warn!(
                        "Trigger for task {} failed (attempt {}/{}), retrying in {:?}: {}",
                        conf.task_id, attempt, max_attempts, delay, e
                    );
                    metrics::TRIGGER_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Record outcomes of runs that reached a terminal state.
    async fn check_run_outcomes(
        queue: &Arc<dyn JobQueue>,
        engine: &Arc<dyn OrchestrationEngine>,
        stats: &WorkerStats,
    ) -> Result<(), WorkerError> {
        let awaiting = queue.awaiting_outcome(MONITOR_BATCH)?;

        for record in awaiting {
            let Some(run_id) = record.run_id.as_deref() else {
                continue;
            };
            let job_id = &record.job.id;

            let (status, reason) = match engine.run(run_id).await {
                Ok(run) => match run.state {
                    RunState::Succeeded => (JobStatus::Succeeded, None),
                    RunState::Failed => (
                        JobStatus::Failed,
                        Some(run.error.unwrap_or_else(|| "pipeline run failed".to_string())),
                    ),
                    RunState::Queued | RunState::Running => continue,
                },
                Err(EngineError::RunNotFound(_)) => (
                    JobStatus::Failed,
                    Some(format!("run {} is unknown to the engine", run_id)),
                ),
                Err(e) => {
                    debug!("Could not poll run {} for job {}: {}", run_id, job_id, e);
                    continue;
                }
            };

            queue.record_outcome(job_id, status, reason.as_deref())?;
            if status == JobStatus::Succeeded {
                stats.runs_succeeded.fetch_add(1, Ordering::Relaxed);
                info!("Job {} succeeded", job_id);
            } else {
                stats.runs_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Job {} failed: {}",
                    job_id,
                    reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        Ok(())
    }
}
