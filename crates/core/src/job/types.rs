//! Job types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Submitter recorded when the request does not name one.
pub const DEFAULT_SUBMITTER: &str = "anonymous";

/// Opaque processing options supplied by the submitter.
pub type JobOptions = serde_json::Map<String, serde_json::Value>;

/// A request to convert one remote PDF to markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier, also used as the pipeline task id.
    pub id: String,
    /// Source document URL.
    pub pdf_url: String,
    /// Opaque options passed through to the pipeline.
    #[serde(default)]
    pub options: JobOptions,
    /// Who submitted the job.
    pub submitted_by: String,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        pdf_url: impl Into<String>,
        options: JobOptions,
        submitted_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pdf_url: pdf_url.into(),
            options,
            submitted_by: submitted_by.into(),
            created_at: Utc::now(),
        }
    }

    /// Build the run configuration handed to the orchestration engine.
    pub fn conf(&self) -> PipelineConf {
        PipelineConf {
            pdf_url: self.pdf_url.clone(),
            options: self.options.clone(),
            submitted_by: self.submitted_by.clone(),
            task_id: self.id.clone(),
        }
    }
}

/// Configuration of one pipeline run.
///
/// `pdf_url` feeds the download stage and `task_id` names the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConf {
    pub pdf_url: String,
    #[serde(default)]
    pub options: JobOptions,
    #[serde(default = "default_submitter")]
    pub submitted_by: String,
    pub task_id: String,
}

fn default_submitter() -> String {
    DEFAULT_SUBMITTER.to_string()
}

/// Lifecycle status of a job. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Built but not yet accepted by the queue.
    Pending,
    /// Accepted by the queue, waiting for a worker.
    Enqueued,
    /// Taken by a worker; the pipeline run is being triggered or is in progress.
    Running,
    /// The pipeline run produced an artifact.
    Succeeded,
    /// The job failed (validation of the run, trigger exhaustion, stage failure or cancellation).
    Failed,
}

impl JobStatus {
    /// Returns the status name as stored and reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Enqueued => "enqueued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Enqueued => 1,
            JobStatus::Running => 2,
            JobStatus::Succeeded | JobStatus::Failed => 3,
        }
    }

    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether moving to `next` keeps the status monotonic.
    ///
    /// Staying in the same non-terminal status is allowed (a redelivered job
    /// stays `Running`); terminal statuses never change.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "enqueued" => Ok(JobStatus::Enqueued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Delivery state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Waiting to be dequeued.
    Ready,
    /// Delivered to a worker, lease not yet settled.
    Leased,
    /// The worker triggered a run and acknowledged the entry.
    Acked,
    /// Settled as failed, or the delivery limit was exceeded.
    Dead,
    /// Removed before any worker took it.
    Cancelled,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Ready => "ready",
            QueueState::Leased => "leased",
            QueueState::Acked => "acked",
            QueueState::Dead => "dead",
            QueueState::Cancelled => "cancelled",
        }
    }

    pub const ALL: [QueueState; 5] = [
        QueueState::Ready,
        QueueState::Leased,
        QueueState::Acked,
        QueueState::Dead,
        QueueState::Cancelled,
    ];
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(QueueState::Ready),
            "leased" => Ok(QueueState::Leased),
            "acked" => Ok(QueueState::Acked),
            "dead" => Ok(QueueState::Dead),
            "cancelled" => Ok(QueueState::Cancelled),
            other => Err(format!("unknown queue state: {}", other)),
        }
    }
}

/// A job together with its queue bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub job: Job,
    pub status: JobStatus,
    pub queue_state: QueueState,
    /// How many times the entry has been handed to a worker.
    pub deliveries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_conf_carries_task_id() {
        let mut options = JobOptions::new();
        options.insert("quality".to_string(), serde_json::json!("high"));
        let job = Job::new("task_1", "http://host/sample.pdf", options, "test@example.com");

        let conf = job.conf();
        assert_eq!(conf.task_id, "task_1");
        assert_eq!(conf.pdf_url, "http://host/sample.pdf");
        assert_eq!(conf.options["quality"], "high");
        assert_eq!(conf.submitted_by, "test@example.com");
    }

    #[test]
    fn test_conf_defaults_when_deserializing() {
        let conf: PipelineConf =
            serde_json::from_str(r#"{"pdf_url": "http://h/a.pdf", "task_id": "t"}"#).unwrap();
        assert!(conf.options.is_empty());
        assert_eq!(conf.submitted_by, DEFAULT_SUBMITTER);
    }

    #[test]
    fn test_status_is_monotonic() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Enqueued));
        assert!(JobStatus::Enqueued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Enqueued.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Running.can_transition_to(JobStatus::Enqueued));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Enqueued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = JobRecord {
            job: Job::new("task_9", "http://h/x.pdf", JobOptions::new(), DEFAULT_SUBMITTER),
            status: JobStatus::Enqueued,
            queue_state: QueueState::Ready,
            deliveries: 0,
            lease_expires_at: None,
            run_id: None,
            failure_reason: None,
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "task_9");
        assert_eq!(json["status"], "enqueued");
        assert_eq!(json["queue_state"], "ready");
        assert!(json.get("run_id").is_none());
    }
}
