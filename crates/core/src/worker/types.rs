//! Types for the worker pool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineError;
use crate::queue::QueueError;

/// Errors that can occur while processing a delivery.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Queue error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// The engine refused or never answered the trigger.
    #[error("trigger failed after {attempts} attempt(s): {source}")]
    TriggerFailed {
        attempts: u32,
        #[source]
        source: EngineError,
    },

    /// Engine error outside of triggering.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current status of the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Whether the pool is running.
    pub running: bool,
    /// Number of worker loops.
    pub workers: usize,
    /// Deliveries currently being triggered.
    pub active: u64,
    /// Jobs whose run was triggered and acknowledged.
    pub dispatched: u64,
    /// Jobs failed because the trigger never succeeded.
    pub trigger_failures: u64,
    /// Runs observed to succeed.
    pub runs_succeeded: u64,
    /// Runs observed to fail.
    pub runs_failed: u64,
}
