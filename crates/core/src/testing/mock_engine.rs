//! Mock orchestration engine for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::engine::{EngineError, OrchestrationEngine, PipelineRun};
use crate::job::PipelineConf;
use crate::stages::RunState;

/// Mock implementation of the OrchestrationEngine trait.
///
/// Provides controllable behavior for testing:
/// - Record every trigger call for assertions
/// - Fail a scripted number of triggers
/// - Delay triggers to exercise timeouts
/// - Choose the state runs finish in
#[derive(Debug)]
pub struct MockEngine {
    /// Runs by id.
    runs: Arc<RwLock<HashMap<String, PipelineRun>>>,
    /// Confs of every trigger call, failed ones included.
    triggered: Arc<RwLock<Vec<PipelineConf>>>,
    /// Errors returned by the next trigger calls, in order.
    errors: Arc<RwLock<VecDeque<EngineError>>>,
    /// Simulated trigger latency.
    trigger_delay: Arc<RwLock<Duration>>,
    /// State and error new runs report.
    outcome: Arc<RwLock<(RunState, Option<String>)>>,
    next_run: AtomicU64,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a mock engine whose runs succeed immediately.
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            triggered: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(VecDeque::new())),
            trigger_delay: Arc::new(RwLock::new(Duration::ZERO)),
            outcome: Arc::new(RwLock::new((RunState::Succeeded, None))),
            next_run: AtomicU64::new(1),
        }
    }

    /// Fail the next trigger calls with these errors, in order.
    pub async fn fail_next(&self, errors: Vec<EngineError>) {
        self.errors.write().await.extend(errors);
    }

    /// Delay every trigger call.
    pub async fn set_trigger_delay(&self, delay: Duration) {
        *self.trigger_delay.write().await = delay;
    }

    /// Set the state (and error) runs report.
    pub async fn set_run_outcome(&self, state: RunState, error: Option<String>) {
        *self.outcome.write().await = (state, error);
    }

    /// Number of trigger calls so far.
    pub async fn trigger_count(&self) -> usize {
        self.triggered.read().await.len()
    }

    /// Confs of all trigger calls so far.
    pub async fn triggered_confs(&self) -> Vec<PipelineConf> {
        self.triggered.read().await.clone()
    }
}

#[async_trait]
impl OrchestrationEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn trigger(&self, conf: &PipelineConf) -> Result<PipelineRun, EngineError> {
        self.triggered.write().await.push(conf.clone());

        let delay = *self.trigger_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.errors.write().await.pop_front() {
            return Err(err);
        }

        let run_id = format!("mock_run_{}", self.next_run.fetch_add(1, Ordering::SeqCst));
        let (state, error) = self.outcome.read().await.clone();

        let mut run = PipelineRun::queued(run_id.clone(), conf.clone());
        run.state = state;
        run.error = error;
        self.runs.write().await.insert(run_id, run.clone());

        Ok(run)
    }

    async fn run(&self, run_id: &str) -> Result<PipelineRun, EngineError> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }
}
