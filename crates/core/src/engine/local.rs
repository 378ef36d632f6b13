//! In-process orchestration engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error};

use crate::job::PipelineConf;
use crate::stages::{RunState, StageRunner};

use super::config::LocalEngineConfig;
use super::traits::OrchestrationEngine;
use super::types::{EngineError, PipelineRun};

/// Runs pipelines on tokio tasks in this process.
///
/// At most `max_concurrent_runs` runs execute at once; later triggers stay
/// `Queued` until a slot frees up. Runs are tracked in memory only, and a
/// finished run is handed out once by [`OrchestrationEngine::run`] and then
/// forgotten.
pub struct LocalEngine {
    runner: Arc<StageRunner>,
    semaphore: Arc<Semaphore>,
    runs: Arc<RwLock<HashMap<String, PipelineRun>>>,
    max_concurrent_runs: usize,
}

impl LocalEngine {
    pub fn new(config: &LocalEngineConfig, runner: StageRunner) -> Self {
        let max_concurrent_runs = config.max_concurrent_runs.max(1);
        Self {
            runner: Arc::new(runner),
            semaphore: Arc::new(Semaphore::new(max_concurrent_runs)),
            runs: Arc::new(RwLock::new(HashMap::new())),
            max_concurrent_runs,
        }
    }

    /// Number of runs currently executing.
    pub fn active_runs(&self) -> usize {
        self.max_concurrent_runs - self.semaphore.available_permits()
    }

    /// Number of runs still tracked: unfinished ones plus finished ones not
    /// yet read.
    pub async fn total_runs(&self) -> usize {
        self.runs.read().await.len()
    }

    async fn set_state(
        runs: &RwLock<HashMap<String, PipelineRun>>,
        run_id: &str,
        update: impl FnOnce(&mut PipelineRun),
    ) {
        let mut runs = runs.write().await;
        if let Some(run) = runs.get_mut(run_id) {
            update(run);
            run.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl OrchestrationEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn trigger(&self, conf: &PipelineConf) -> Result<PipelineRun, EngineError> {
        let run_id = format!("run_{}", uuid::Uuid::new_v4().simple());
        let run = PipelineRun::queued(run_id.clone(), conf.clone());

        self.runs.write().await.insert(run_id.clone(), run.clone());
        debug!("Queued local run {} for task {}", run_id, conf.task_id);

        let runner = Arc::clone(&self.runner);
        let semaphore = Arc::clone(&self.semaphore);
        let runs = Arc::clone(&self.runs);
        let conf = conf.clone();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Run {} could not start: {}", run_id, e);
                    Self::set_state(&runs, &run_id, |run| {
                        run.state = RunState::Failed;
                        run.error = Some("engine shut down".to_string());
                    })
                    .await;
                    return;
                }
            };

            Self::set_state(&runs, &run_id, |run| run.state = RunState::Running).await;

            let report = runner.run(&conf).await;

            Self::set_state(&runs, &run_id, |run| {
                run.state = report.state;
                run.artifact_path = report.artifact_path;
                run.error = report.error;
            })
            .await;
        });

        Ok(run)
    }

    async fn run(&self, run_id: &str) -> Result<PipelineRun, EngineError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;
        if run.state.is_terminal() {
            runs.remove(run_id);
            debug!("Released finished run {}", run_id);
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::FsArtifactStore;
    use crate::testing::{MockExtractor, MockFetcher};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn wait_terminal(engine: &LocalEngine, run_id: &str) -> PipelineRun {
        for _ in 0..200 {
            let run = engine.run(run_id).await.unwrap();
            if run.state.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} did not finish", run_id);
    }

    fn engine(fetcher: MockFetcher, dir: &TempDir, max: usize) -> LocalEngine {
        let runner = StageRunner::new(
            Arc::new(fetcher),
            Arc::new(MockExtractor::new()),
            Arc::new(FsArtifactStore::new(dir.path())),
        );
        LocalEngine::new(
            &LocalEngineConfig {
                max_concurrent_runs: max,
            },
            runner,
        )
    }

    #[tokio::test]
    async fn test_trigger_runs_pipeline() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher
            .add_document("http://h/a.pdf", MockExtractor::document(&["One", "Two"]))
            .await;
        let engine = engine(fetcher, &dir, 2);

        let conf: PipelineConf =
            serde_json::from_value(json!({"pdf_url": "http://h/a.pdf", "task_id": "task_l1"}))
                .unwrap();
        let run = engine.trigger(&conf).await.unwrap();
        assert_eq!(run.state, RunState::Queued);
        assert_eq!(run.job_id, "task_l1");

        let finished = wait_terminal(&engine, &run.run_id).await;
        assert_eq!(finished.state, RunState::Succeeded);
        let path = finished.artifact_path.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "OneTwo");
        assert_eq!(engine.active_runs(), 0);
    }

    #[tokio::test]
    async fn test_finished_runs_are_released_after_read() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher
            .add_document("http://h/ok.pdf", MockExtractor::document(&["Body"]))
            .await;
        let engine = engine(fetcher, &dir, 4);

        let mut run_ids = Vec::new();
        for i in 0..30 {
            let url = if i % 2 == 0 { "http://h/ok.pdf" } else { "http://h/404.pdf" };
            let conf: PipelineConf = serde_json::from_value(
                json!({"pdf_url": url, "task_id": format!("task_r{}", i)}),
            )
            .unwrap();
            run_ids.push(engine.trigger(&conf).await.unwrap().run_id);
        }
        assert_eq!(engine.total_runs().await, 30);

        for run_id in &run_ids {
            wait_terminal(&engine, run_id).await;
        }
        assert_eq!(engine.total_runs().await, 0);
        assert!(matches!(
            engine.run(&run_ids[0]).await,
            Err(EngineError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unfinished_runs_stay_tracked() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher
            .add_document("http://h/a.pdf", MockExtractor::document(&["A"]))
            .await;
        // No permits left for the run, so it stays queued
        let engine = engine(fetcher, &dir, 1);
        let _held = engine.semaphore.clone().acquire_owned().await.unwrap();

        let conf: PipelineConf =
            serde_json::from_value(json!({"pdf_url": "http://h/a.pdf", "task_id": "task_q"}))
                .unwrap();
        let run = engine.trigger(&conf).await.unwrap();
        for _ in 0..3 {
            assert_eq!(engine.run(&run.run_id).await.unwrap().state, RunState::Queued);
        }
        assert_eq!(engine.total_runs().await, 1);
    }

    #[tokio::test]
    async fn test_failed_run_reports_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine(MockFetcher::new(), &dir, 1);

        let conf: PipelineConf =
            serde_json::from_value(json!({"pdf_url": "http://h/404.pdf", "task_id": "task_l2"}))
                .unwrap();
        let run = engine.trigger(&conf).await.unwrap();

        let finished = wait_terminal(&engine, &run.run_id).await;
        assert_eq!(finished.state, RunState::Failed);
        assert!(finished.error.unwrap().starts_with("NetworkError"));
        assert!(finished.artifact_path.is_none());
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let dir = TempDir::new().unwrap();
        let engine = engine(MockFetcher::new(), &dir, 1);
        assert!(matches!(
            engine.run("run_nope").await,
            Err(EngineError::RunNotFound(_))
        ));
    }
}
