//! Job model for the extraction pipeline.
//!
//! A [`Job`] is built once at the submission boundary and never mutated
//! afterwards. Its lifecycle is tracked separately by the queue as a
//! [`JobRecord`] carrying a monotonic [`JobStatus`].

mod types;

pub use types::{
    Job, JobOptions, JobRecord, JobStatus, PipelineConf, QueueState, DEFAULT_SUBMITTER,
};
