//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the pdfpipe server:
//! - HTTP request metrics (latency, counts, in-flight)
//! - Queue depth per delivery state (collected dynamically)
//! - Worker pool activity (collected dynamically)
//!
//! Pipeline metrics (submissions, triggers, stages, runs) live in the core
//! crate and are registered here alongside the server's own.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use pdfpipe_core::QueueState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pdfpipe_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpipe_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "pdfpipe_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics (collected dynamically)
// =============================================================================

/// Queue entries by delivery state.
pub static QUEUE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("pdfpipe_queue_entries", "Queue entries by delivery state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Worker Metrics (collected dynamically)
// =============================================================================

/// Worker pool running state (1 = running, 0 = stopped).
pub static WORKER_POOL_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "pdfpipe_worker_pool_running",
        "Whether the worker pool is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Deliveries currently being triggered.
pub static WORKERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "pdfpipe_workers_active",
        "Number of deliveries currently being triggered",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Queue
    registry.register(Box::new(QUEUE_ENTRIES.clone())).unwrap();

    // Workers
    registry
        .register(Box::new(WORKER_POOL_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(WORKERS_ACTIVE.clone())).unwrap();

    // Core metrics (gateway, queue, workers, stages)
    for metric in pdfpipe_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the queue and pool right now.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(status) = state.queue().status() {
        for queue_state in QueueState::ALL {
            let count = match queue_state {
                QueueState::Ready => status.ready,
                QueueState::Leased => status.leased,
                QueueState::Acked => status.acked,
                QueueState::Dead => status.dead,
                QueueState::Cancelled => status.cancelled,
            };
            QUEUE_ENTRIES
                .with_label_values(&[queue_state.as_str()])
                .set(count as i64);
        }
    }

    match state.pool() {
        Some(pool) => {
            let status = pool.status();
            WORKER_POOL_RUNNING.set(if status.running { 1 } else { 0 });
            WORKERS_ACTIVE.set(status.active as i64);
        }
        None => {
            WORKER_POOL_RUNNING.set(0);
            WORKERS_ACTIVE.set(0);
        }
    }
}

static TASK_ID_REGEX: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"task_[0-9a-fA-F]{32}").unwrap());
static UUID_REGEX: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap()
});
static NUMERIC_REGEX: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = TASK_ID_REGEX.replace_all(path, "{id}");
    let result = UUID_REGEX.replace_all(&result, "{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}
