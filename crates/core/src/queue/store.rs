//! Job queue trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{Job, JobRecord, JobStatus};

/// Error type for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A job with this id was already enqueued.
    #[error("job already exists: {0}")]
    Conflict(String),

    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Cannot perform operation in the entry's current state.
    #[error("cannot {operation} job {job_id}: current state is {current_state}")]
    InvalidState {
        job_id: String,
        current_state: String,
        operation: String,
    },

    /// The queue has been closed and hands out no more work.
    #[error("queue is closed")]
    Closed,

    /// Storage failure.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A job handed to exactly one worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: Job,
    /// 1 for the first delivery, incremented on every redelivery.
    pub attempt: u32,
    /// When the lease lapses if the delivery is not settled.
    pub lease_expires_at: DateTime<Utc>,
}

/// Result of a lease sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapOutcome {
    /// Jobs returned to the ready state for redelivery.
    pub requeued: Vec<String>,
    /// Jobs that exhausted their deliveries and were failed.
    pub dead: Vec<String>,
}

impl ReapOutcome {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.dead.is_empty()
    }
}

/// Entry counts per delivery state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub ready: usize,
    pub leased: usize,
    pub acked: usize,
    pub dead: usize,
    pub cancelled: usize,
}

impl QueueStatus {
    pub fn total(&self) -> usize {
        self.ready + self.leased + self.acked + self.dead + self.cancelled
    }
}

/// Trait for job queue backends.
///
/// Implementations must serialize mutations so that id uniqueness and
/// exclusive delivery hold under concurrent callers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job to the tail of the queue.
    fn enqueue(&self, job: Job) -> Result<JobRecord, QueueError>;

    /// Wait for the oldest ready job and lease it to the caller.
    ///
    /// Returns [`QueueError::Closed`] once the queue is closed.
    async fn dequeue(&self) -> Result<Delivery, QueueError>;

    /// Lease the oldest ready job if there is one, without waiting.
    fn try_dequeue(&self) -> Result<Option<Delivery>, QueueError>;

    /// Settle a leased delivery as handed off.
    fn ack(&self, job_id: &str) -> Result<(), QueueError>;

    /// Settle a leased delivery as failed.
    fn fail(&self, job_id: &str, reason: &str) -> Result<(), QueueError>;

    /// Remove a job that no worker has taken yet.
    fn cancel(&self, job_id: &str) -> Result<JobRecord, QueueError>;

    /// Return expired leases to the queue, or fail them past the delivery bound.
    fn reap_expired(&self) -> Result<ReapOutcome, QueueError>;

    /// Remember the pipeline run triggered for a job.
    fn attach_run(&self, job_id: &str, run_id: &str) -> Result<(), QueueError>;

    /// Acknowledged jobs whose run outcome is still unknown, oldest first.
    fn awaiting_outcome(&self, limit: usize) -> Result<Vec<JobRecord>, QueueError>;

    /// Record the final outcome of a job's run.
    fn record_outcome(
        &self,
        job_id: &str,
        status: JobStatus,
        reason: Option<&str>,
    ) -> Result<JobRecord, QueueError>;

    /// Get a job record by id.
    fn get(&self, job_id: &str) -> Result<Option<JobRecord>, QueueError>;

    /// Count entries per delivery state.
    fn status(&self) -> Result<QueueStatus, QueueError>;

    /// Number of jobs waiting to be dequeued.
    fn ready_count(&self) -> Result<usize, QueueError>;

    /// Stop accepting and handing out work, and wake blocked dequeues.
    fn close(&self);
}
