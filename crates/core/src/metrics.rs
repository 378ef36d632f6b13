//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Submission (accepted and rejected jobs)
//! - Queue (deliveries, redeliveries)
//! - Workers (trigger attempts, retries)
//! - Pipeline runs (stage durations, failures, outcomes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Submission Metrics
// =============================================================================

/// Jobs accepted by the gateway.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("pdfpipe_jobs_submitted_total", "Total jobs accepted").unwrap()
});

/// Submissions rejected by reason.
pub static JOBS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpipe_jobs_rejected_total", "Total rejected submissions"),
        &["reason"], // "validation", "conflict", "queue_unavailable"
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics
// =============================================================================

/// Deliveries handed to workers (including redeliveries).
pub static QUEUE_DELIVERIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pdfpipe_queue_deliveries_total",
        "Total queue deliveries to workers",
    )
    .unwrap()
});

/// Expired leases returned to the queue.
pub static QUEUE_REDELIVERIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pdfpipe_queue_redeliveries_total",
        "Total expired leases requeued for redelivery",
    )
    .unwrap()
});

// =============================================================================
// Worker Metrics
// =============================================================================

/// Trigger attempts by result.
pub static TRIGGER_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pdfpipe_trigger_attempts_total",
            "Total pipeline trigger attempts",
        ),
        &["result"], // "success", "error", "timeout"
    )
    .unwrap()
});

/// Trigger retries after a retryable failure.
pub static TRIGGER_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("pdfpipe_trigger_retries_total", "Total trigger retries").unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("pdfpipe_stage_duration_seconds", "Duration of pipeline stages")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["stage"],
    )
    .unwrap()
});

/// Stage failures by stage and error kind.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpipe_stage_failures_total", "Total stage failures"),
        &["stage", "kind"],
    )
    .unwrap()
});

/// Finished pipeline runs by outcome.
pub static RUNS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpipe_runs_completed_total", "Total finished pipeline runs"),
        &["outcome"], // "succeeded", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Submission
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        // Queue
        Box::new(QUEUE_DELIVERIES.clone()),
        Box::new(QUEUE_REDELIVERIES.clone()),
        // Workers
        Box::new(TRIGGER_ATTEMPTS.clone()),
        Box::new(TRIGGER_RETRIES.clone()),
        // Pipeline
        Box::new(STAGE_DURATION.clone()),
        Box::new(STAGE_FAILURES.clone()),
        Box::new(RUNS_COMPLETED.clone()),
    ]
}
