//! Stage types and errors.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four stages of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Download,
    ExtractText,
    ConvertMarkdown,
    SaveResult,
}

impl StageName {
    /// Execution order of a run.
    pub const ALL: [StageName; 4] = [
        StageName::Download,
        StageName::ExtractText,
        StageName::ConvertMarkdown,
        StageName::SaveResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Download => "download",
            StageName::ExtractText => "extract_text",
            StageName::ConvertMarkdown => "convert_markdown",
            StageName::SaveResult => "save_result",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a pipeline run.
///
/// `Queued -> Running -> {Succeeded, Failed}`; a terminal state is reached once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePayload {
    /// Raw binary data (the downloaded document).
    Bytes(Vec<u8>),
    /// UTF-8 text (extracted text, markdown, artifact path).
    Text(String),
}

impl StagePayload {
    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        match self {
            StagePayload::Bytes(bytes) => bytes.len(),
            StagePayload::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the payload as bytes, failing on a text payload.
    pub fn into_bytes(self) -> Result<Vec<u8>, StageError> {
        match self {
            StagePayload::Bytes(bytes) => Ok(bytes),
            StagePayload::Text(_) => Err(StageError::Codec(
                "expected a binary payload, got text".to_string(),
            )),
        }
    }

    /// Take the payload as text, failing on a binary payload.
    pub fn into_text(self) -> Result<String, StageError> {
        match self {
            StagePayload::Text(text) => Ok(text),
            StagePayload::Bytes(_) => Err(StageError::Codec(
                "expected a text payload, got bytes".to_string(),
            )),
        }
    }
}

/// Output of one stage, as handed to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: StageName,
    pub payload: StagePayload,
    pub ok: bool,
}

impl StageResult {
    /// A successful stage output.
    pub fn ok(stage: StageName, payload: StagePayload) -> Self {
        Self {
            stage,
            payload,
            ok: true,
        }
    }
}

/// Errors a stage can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    /// Host unreachable or non-2xx response.
    #[error("Network error: {0}")]
    Network(String),

    /// The download did not finish in time.
    #[error("Timed out after {secs} seconds")]
    Timeout { secs: u64 },

    /// The document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The artifact could not be written.
    #[error("I/O error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// The task id cannot be used as part of a file name.
    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    /// A stage boundary carried an unreadable or mistyped envelope.
    #[error("Handoff codec error: {0}")]
    Codec(String),
}

impl StageError {
    /// Creates an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Name of the error class reported in a run's failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Network(_) | StageError::Timeout { .. } => "NetworkError",
            StageError::Parse(_) => "ParseError",
            StageError::Io { .. } | StageError::InvalidTaskId(_) => "IOError",
            StageError::Codec(_) => "CodecError",
        }
    }
}
