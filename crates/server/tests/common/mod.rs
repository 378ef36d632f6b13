//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a real SQLite queue and a mock orchestration engine, so requests
//! can be driven end to end without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pdfpipe_core::{
    testing::{MockEngine, SequenceIdGenerator},
    Config, DatabaseConfig, JobQueue, JobStatus, QueueConfig, RetryConfig, SqliteJobQueue,
    SubmissionGateway, WorkerConfig, WorkerPool,
};
use pdfpipe_server::state::AppState;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/submit", json!({
///         "pdf_url": "http://example.com/sample.pdf"
///     })).await;
///
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The queue behind the gateway
    pub queue: Arc<SqliteJobQueue>,
    /// Mock engine - control trigger outcomes
    pub engine: Arc<MockEngine>,
    /// Worker pool, present when enabled in [`TestConfig`]
    pub pool: Option<Arc<WorkerPool>>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture without workers.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            queue: QueueConfig::default().with_poll_interval_ms(10),
            worker: WorkerConfig::default()
                .with_concurrency(2)
                .with_trigger_timeout_secs(1)
                .with_intervals(20, 20)
                .with_retry(RetryConfig {
                    max_attempts: 2,
                    initial_delay_ms: 5,
                    max_delay_ms: 10,
                    backoff_multiplier: 2.0,
                }),
            ..Default::default()
        };
        config.worker.enabled = test_config.enable_workers;
        config.engine.http.password = "hunter2".to_string();

        let queue = Arc::new(
            SqliteJobQueue::new(&db_path, config.queue.clone())
                .expect("Failed to create job queue"),
        );
        let engine = Arc::new(MockEngine::new());

        let gateway = SubmissionGateway::new(
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            Arc::new(match &test_config.fixed_job_id {
                Some(id) => SequenceIdGenerator::repeating(id),
                None => SequenceIdGenerator::new("task"),
            }),
        );

        let pool = if test_config.enable_workers {
            let pool = Arc::new(WorkerPool::new(
                config.worker.clone(),
                Arc::clone(&queue) as Arc<dyn JobQueue>,
                Arc::clone(&engine) as Arc<dyn pdfpipe_core::OrchestrationEngine>,
            ));
            pool.start().await;
            Some(pool)
        } else {
            None
        };

        let state = Arc::new(AppState::new(
            config,
            gateway,
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            pool.clone(),
        ));

        let router = pdfpipe_server::api::create_router(state);

        Self {
            router,
            queue,
            engine,
            pool,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a path and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll the queue until a job reaches `status`.
    pub async fn wait_for_status(&self, job_id: &str, status: JobStatus) -> bool {
        for _ in 0..200 {
            if self.queue.get(job_id).unwrap().map(|r| r.status) == Some(status) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Stop the worker pool if one was started.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.stop().await;
        }
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Start a worker pool on the mock engine
    pub enable_workers: bool,
    /// Hand out this id for every submission (for conflict tests)
    pub fixed_job_id: Option<String>,
}

impl TestConfig {
    /// Create config with workers enabled.
    pub fn with_workers() -> Self {
        Self {
            enable_workers: true,
            fixed_job_id: None,
        }
    }

    /// Create config whose id generator always returns `id`.
    pub fn with_fixed_job_id(id: &str) -> Self {
        Self {
            enable_workers: false,
            fixed_job_id: Some(id.to_string()),
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
