//! Worker pool that moves jobs from the queue to the orchestration engine.
//!
//! Each worker repeatedly takes the oldest job off the queue, triggers a
//! pipeline run for it, and acknowledges the delivery once the engine has
//! accepted the run. A reaper loop redelivers jobs whose lease expired and a
//! monitor loop records the final outcome of triggered runs.

mod config;
mod pool;
mod types;

pub use config::{RetryConfig, WorkerConfig};
pub use pool::WorkerPool;
pub use types::{WorkerError, WorkerStatus};
