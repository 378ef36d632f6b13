//! Orchestration engine types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::PipelineConf;
use crate::stages::RunState;

/// One pipeline run, as tracked by an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    /// Job the run belongs to (the conf's task id).
    pub job_id: String,
    pub conf: PipelineConf,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    /// A freshly triggered run.
    pub fn queued(run_id: impl Into<String>, conf: PipelineConf) -> Self {
        Self {
            run_id: run_id.into(),
            job_id: conf.task_id.clone(),
            conf,
            state: RunState::Queued,
            artifact_path: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Errors from an orchestration engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be reached.
    #[error("Engine unreachable: {0}")]
    Network(String),

    /// The call did not complete in time.
    #[error("Engine call timed out after {secs} seconds")]
    Timeout { secs: u64 },

    /// The engine answered with a non-2xx status.
    #[error("Engine rejected request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No run with this id.
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// The engine answered with something we could not interpret.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// Whether retrying the same call may succeed.
    ///
    /// Transport failures, timeouts and server-side rejections (5xx, 408, 429)
    /// are retryable; client-side rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) | EngineError::Timeout { .. } => true,
            EngineError::Rejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            EngineError::RunNotFound(_) | EngineError::InvalidResponse(_) => false,
        }
    }
}
