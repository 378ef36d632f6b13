//! HTTP client for an external DAG engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::job::PipelineConf;
use crate::stages::RunState;

use super::config::HttpEngineConfig;
use super::traits::OrchestrationEngine;
use super::types::{EngineError, PipelineRun};

/// Triggers and polls runs of a DAG through the engine's REST API.
///
/// Runs are created with `POST {base}/api/v1/dags/{dag_id}/dagRuns` and read
/// back with `GET .../dagRuns/{run_id}`, authenticated with HTTP basic auth.
pub struct HttpEngine {
    client: Client,
    config: HttpEngineConfig,
}

#[derive(Serialize)]
struct TriggerRequest<'a> {
    conf: &'a PipelineConf,
}

#[derive(Deserialize)]
struct DagRunResponse {
    dag_run_id: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    conf: Option<PipelineConf>,
}

impl HttpEngine {
    pub fn new(config: HttpEngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn runs_url(&self) -> String {
        format!(
            "{}/api/v1/dags/{}/dagRuns",
            self.base_url(),
            urlencoding::encode(&self.config.dag_id)
        )
    }

    fn run_url(&self, run_id: &str) -> String {
        format!("{}/{}", self.runs_url(), urlencoding::encode(run_id))
    }

    fn map_error(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            EngineError::Network(e.to_string())
        }
    }

    async fn read_run(
        &self,
        response: Response,
        fallback_conf: Option<&PipelineConf>,
    ) -> Result<PipelineRun, EngineError> {
        let body: DagRunResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let state = match body.state.as_deref() {
            None => RunState::Queued,
            Some(state) => parse_state(state)?,
        };
        let conf = body
            .conf
            .or_else(|| fallback_conf.cloned())
            .ok_or_else(|| {
                EngineError::InvalidResponse(format!("run {} has no conf", body.dag_run_id))
            })?;

        let mut run = PipelineRun::queued(body.dag_run_id, conf);
        run.state = state;
        if state == RunState::Failed {
            run.error = Some("pipeline run failed in engine".to_string());
        }
        Ok(run)
    }
}

/// Map an engine run state to ours.
fn parse_state(state: &str) -> Result<RunState, EngineError> {
    match state {
        "queued" => Ok(RunState::Queued),
        "running" => Ok(RunState::Running),
        "success" => Ok(RunState::Succeeded),
        "failed" => Ok(RunState::Failed),
        other => Err(EngineError::InvalidResponse(format!(
            "unknown run state: {}",
            other
        ))),
    }
}

async fn rejected(response: Response) -> EngineError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    EngineError::Rejected {
        status,
        message: body.chars().take(200).collect(),
    }
}

#[async_trait]
impl OrchestrationEngine for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn trigger(&self, conf: &PipelineConf) -> Result<PipelineRun, EngineError> {
        let url = self.runs_url();
        debug!("Triggering run for task {} at {}", conf.task_id, url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&TriggerRequest { conf })
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        self.read_run(response, Some(conf)).await
    }

    async fn run(&self, run_id: &str) -> Result<PipelineRun, EngineError> {
        let response = self
            .client
            .get(self.run_url(run_id))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::RunNotFound(run_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        self.read_run(response, None).await
    }
}
