//! Orchestration engine trait.

use async_trait::async_trait;

use crate::job::PipelineConf;

use super::types::{EngineError, PipelineRun};

/// An engine that executes pipeline runs.
#[async_trait]
pub trait OrchestrationEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Start a new run with the given configuration.
    async fn trigger(&self, conf: &PipelineConf) -> Result<PipelineRun, EngineError>;

    /// Current state of a run.
    async fn run(&self, run_id: &str) -> Result<PipelineRun, EngineError>;
}
