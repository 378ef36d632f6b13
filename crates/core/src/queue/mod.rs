//! Durable FIFO job queue.
//!
//! The queue decouples submission from execution:
//! - **Enqueue**: rejects duplicate ids, never merges or overwrites
//! - **Dequeue**: exclusive delivery, the oldest ready job goes to exactly one caller
//! - **Leases**: unsettled deliveries expire and are redelivered up to a bound
//!
//! Settling a delivery (`ack`/`fail`) is separate from the final job outcome,
//! which is recorded once the pipeline run finishes.

mod config;
mod sqlite_queue;
mod store;

pub use config::QueueConfig;
pub use sqlite_queue::SqliteJobQueue;
pub use store::{Delivery, JobQueue, QueueError, QueueStatus, ReapOutcome};
