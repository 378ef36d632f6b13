//! Submission gateway.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::job::{Job, JobOptions, JobRecord, DEFAULT_SUBMITTER};
use crate::metrics;
use crate::queue::{JobQueue, QueueError};

use super::ids::IdGenerator;

/// Message returned when a submission has no URL.
pub const MISSING_PDF_URL: &str = "Missing pdf_url";

/// Errors from the gateway.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The submission is malformed. Nothing was enqueued.
    #[error("{0}")]
    Validation(String),

    /// The queue refused the job id or the requested change.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No job with this id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The queue could not be reached or failed.
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),
}

impl GatewayError {
    fn from_queue(err: QueueError) -> Self {
        match err {
            QueueError::Conflict(_) | QueueError::InvalidState { .. } => {
                GatewayError::Conflict(err.to_string())
            }
            QueueError::NotFound(id) => GatewayError::NotFound(id),
            QueueError::Closed | QueueError::Database(_) | QueueError::Serialization(_) => {
                GatewayError::QueueUnavailable(err.to_string())
            }
        }
    }

    fn metric_reason(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Conflict(_) => "conflict",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::QueueUnavailable(_) => "queue_unavailable",
        }
    }
}

/// A job submission as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub options: Option<JobOptions>,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

impl SubmitRequest {
    pub fn new(pdf_url: impl Into<String>) -> Self {
        Self {
            pdf_url: Some(pdf_url.into()),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_submitted_by(mut self, submitted_by: impl Into<String>) -> Self {
        self.submitted_by = Some(submitted_by.into());
        self
    }
}

/// Check that a URL is an absolute `http`/`https` URL with a host.
pub fn validate_pdf_url(pdf_url: &str) -> Result<(), GatewayError> {
    let url = reqwest::Url::parse(pdf_url)
        .map_err(|e| GatewayError::Validation(format!("Invalid pdf_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(GatewayError::Validation(format!(
            "Invalid pdf_url: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(GatewayError::Validation(
            "Invalid pdf_url: missing host".to_string(),
        ));
    }
    Ok(())
}

/// Accepts submissions, allocates ids and enqueues jobs.
///
/// Holds no per-request state; concurrent submissions only meet in the queue.
pub struct SubmissionGateway {
    queue: Arc<dyn JobQueue>,
    ids: Arc<dyn IdGenerator>,
}

impl SubmissionGateway {
    pub fn new(queue: Arc<dyn JobQueue>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { queue, ids }
    }

    /// Validate and enqueue a submission, returning the new job id.
    pub fn submit(&self, request: SubmitRequest) -> Result<String, GatewayError> {
        let result = self.try_submit(request);
        match &result {
            Ok(job_id) => {
                metrics::JOBS_SUBMITTED.inc();
                info!("Accepted job {}", job_id);
            }
            Err(e) => {
                metrics::JOBS_REJECTED
                    .with_label_values(&[e.metric_reason()])
                    .inc();
                warn!("Rejected submission: {}", e);
            }
        }
        result
    }

    fn try_submit(&self, request: SubmitRequest) -> Result<String, GatewayError> {
        let pdf_url = request
            .pdf_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::Validation(MISSING_PDF_URL.to_string()))?;
        validate_pdf_url(&pdf_url)?;

        let submitted_by = request
            .submitted_by
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBMITTER.to_string());

        let job = Job::new(
            self.ids.next_id(),
            pdf_url,
            request.options.unwrap_or_default(),
            submitted_by,
        );

        let record = self.queue.enqueue(job).map_err(GatewayError::from_queue)?;
        Ok(record.job.id)
    }

    /// Cancel a job no worker has taken yet.
    pub fn cancel(&self, job_id: &str) -> Result<JobRecord, GatewayError> {
        self.queue.cancel(job_id).map_err(GatewayError::from_queue)
    }

    /// Current record of a job.
    pub fn status(&self, job_id: &str) -> Result<JobRecord, GatewayError> {
        self.queue
            .get(job_id)
            .map_err(GatewayError::from_queue)?
            .ok_or_else(|| GatewayError::NotFound(job_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobStatus, QueueState};
    use crate::queue::{QueueConfig, SqliteJobQueue};
    use crate::gateway::UuidIdGenerator;
    use crate::testing::SequenceIdGenerator;
    use serde_json::json;

    fn gateway_with(ids: SequenceIdGenerator) -> (SubmissionGateway, Arc<SqliteJobQueue>) {
        let queue = Arc::new(SqliteJobQueue::in_memory(QueueConfig::default()).unwrap());
        let gateway = SubmissionGateway::new(queue.clone(), Arc::new(ids));
        (gateway, queue)
    }

    #[test]
    fn test_submit_enqueues_one_job() {
        let (gateway, queue) = gateway_with(SequenceIdGenerator::new("task"));

        let mut options = JobOptions::new();
        options.insert("quality".to_string(), json!("high"));
        let job_id = gateway
            .submit(
                SubmitRequest::new("http://example.com/sample.pdf")
                    .with_options(options)
                    .with_submitted_by("test@example.com"),
            )
            .unwrap();

        assert_eq!(job_id, "task_1");
        assert_eq!(queue.ready_count().unwrap(), 1);

        let record = gateway.status(&job_id).unwrap();
        assert_eq!(record.status, JobStatus::Enqueued);
        assert_eq!(record.job.submitted_by, "test@example.com");
        assert_eq!(record.job.options["quality"], "high");
    }

    #[test]
    fn test_defaults_submitter_and_options() {
        let (gateway, _queue) = gateway_with(SequenceIdGenerator::new("task"));
        let job_id = gateway
            .submit(SubmitRequest::new("https://example.com/a.pdf"))
            .unwrap();

        let record = gateway.status(&job_id).unwrap();
        assert_eq!(record.job.submitted_by, DEFAULT_SUBMITTER);
        assert!(record.job.options.is_empty());
    }

    #[test]
    fn test_missing_url_never_enqueues() {
        let (gateway, queue) = gateway_with(SequenceIdGenerator::new("task"));

        for request in [
            SubmitRequest::default(),
            SubmitRequest::new(""),
            SubmitRequest::new("   "),
        ] {
            let err = gateway.submit(request).unwrap_err();
            assert_eq!(err, GatewayError::Validation(MISSING_PDF_URL.to_string()));
        }
        assert_eq!(queue.status().unwrap().total(), 0);
    }

    #[test]
    fn test_malformed_url_never_enqueues() {
        let (gateway, queue) = gateway_with(SequenceIdGenerator::new("task"));

        for url in [
            "not a url",
            "/relative/path.pdf",
            "ftp://example.com/a.pdf",
            "file:///etc/passwd",
            "http://",
        ] {
            let err = gateway.submit(SubmitRequest::new(url)).unwrap_err();
            assert!(
                matches!(err, GatewayError::Validation(ref msg) if msg.starts_with("Invalid pdf_url")),
                "{} gave {:?}",
                url,
                err
            );
        }
        assert_eq!(queue.status().unwrap().total(), 0);
    }

    #[test]
    fn test_duplicate_id_is_conflict() {
        let (gateway, queue) = gateway_with(SequenceIdGenerator::repeating("task_same"));

        gateway
            .submit(SubmitRequest::new("http://example.com/a.pdf"))
            .unwrap();
        let err = gateway
            .submit(SubmitRequest::new("http://example.com/b.pdf"))
            .unwrap_err();

        assert!(matches!(err, GatewayError::Conflict(_)));
        assert_eq!(queue.ready_count().unwrap(), 1);
    }

    #[test]
    fn test_closed_queue_is_unavailable() {
        let (gateway, queue) = gateway_with(SequenceIdGenerator::new("task"));
        queue.close();

        let err = gateway
            .submit(SubmitRequest::new("http://example.com/a.pdf"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::QueueUnavailable(_)));
    }

    #[test]
    fn test_cancel_and_status() {
        let (gateway, queue) = gateway_with(SequenceIdGenerator::new("task"));
        let first = gateway
            .submit(SubmitRequest::new("http://example.com/a.pdf"))
            .unwrap();
        let second = gateway
            .submit(SubmitRequest::new("http://example.com/b.pdf"))
            .unwrap();

        let record = gateway.cancel(&first).unwrap();
        assert_eq!(record.queue_state, QueueState::Cancelled);

        queue.try_dequeue().unwrap().unwrap();
        assert!(matches!(
            gateway.cancel(&second),
            Err(GatewayError::Conflict(_))
        ));
        assert!(matches!(
            gateway.status("task_missing"),
            Err(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_submissions_get_distinct_ids() {
        let queue = Arc::new(SqliteJobQueue::in_memory(QueueConfig::default()).unwrap());
        let gateway = SubmissionGateway::new(queue.clone(), Arc::new(UuidIdGenerator));
        let threads = 16;
        let per_thread = 50;

        let ids: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|t| {
                    let gateway = &gateway;
                    scope.spawn(move || {
                        (0..per_thread)
                            .map(|i| {
                                let url = format!("http://example.com/{}/{}.pdf", t, i);
                                gateway.submit(SubmitRequest::new(url)).unwrap()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), threads * per_thread);
        assert_eq!(unique.len(), threads * per_thread);
        assert_eq!(queue.ready_count().unwrap(), threads * per_thread);
    }
}
