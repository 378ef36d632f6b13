//! Sequential stage runner.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::job::PipelineConf;
use crate::metrics;

use super::artifact::ArtifactStore;
use super::codec;
use super::download::Fetcher;
use super::extract::TextExtractor;
use super::markdown::convert_markdown;
use super::types::{RunState, StageError, StageName, StagePayload, StageResult};

/// What happened in one stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub ok: bool,
    pub duration_ms: u64,
    /// Size of the stage output, 0 on failure.
    pub output_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    /// Stages that were started, in order. Stages after a failure are absent.
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    /// `"<ErrorKind>: <message>"` of the failing stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    fn running() -> Self {
        Self {
            state: RunState::Running,
            stages: Vec::new(),
            artifact_path: None,
            error: None,
        }
    }

    /// The stage that failed, if any.
    pub fn failed_stage(&self) -> Option<StageName> {
        self.stages.iter().find(|s| !s.ok).map(|s| s.stage)
    }
}

/// Runs the download, extract, convert and save stages of one job.
///
/// Each stage starts only after the previous one succeeded, and every stage
/// output crosses into the next stage through the handoff codec.
pub struct StageRunner {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn TextExtractor>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl StageRunner {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn TextExtractor>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            artifacts,
        }
    }

    /// Run all stages for `conf` and report the terminal state.
    pub async fn run(&self, conf: &PipelineConf) -> RunReport {
        let mut report = RunReport::running();
        info!("Starting pipeline run for task {}", conf.task_id);

        match self.execute(conf, &mut report).await {
            Ok(path) => {
                info!(
                    "Pipeline run for task {} succeeded: {}",
                    conf.task_id,
                    path.display()
                );
                report.state = RunState::Succeeded;
                report.artifact_path = Some(path);
                metrics::RUNS_COMPLETED
                    .with_label_values(&[RunState::Succeeded.as_str()])
                    .inc();
            }
            Err(e) => {
                warn!("Pipeline run for task {} failed: {}", conf.task_id, e);
                report.state = RunState::Failed;
                report.error = Some(format!("{}: {}", e.kind(), e));
                metrics::RUNS_COMPLETED
                    .with_label_values(&[RunState::Failed.as_str()])
                    .inc();
            }
        }

        report
    }

    async fn execute(
        &self,
        conf: &PipelineConf,
        report: &mut RunReport,
    ) -> Result<PathBuf, StageError> {
        let downloaded = timed(report, StageName::Download, async {
            let bytes = self.fetcher.fetch(&conf.pdf_url).await?;
            Ok(StagePayload::Bytes(bytes))
        })
        .await?;
        let document = handoff(&downloaded)?.payload.into_bytes()?;

        let extracted = timed(report, StageName::ExtractText, async {
            let extractor = Arc::clone(&self.extractor);
            let text = tokio::task::spawn_blocking(move || extractor.extract(&document))
                .await
                .map_err(|e| StageError::Parse(format!("extraction task failed: {}", e)))??;
            Ok(StagePayload::Text(text))
        })
        .await?;
        let text = handoff(&extracted)?.payload.into_text()?;

        let converted = timed(report, StageName::ConvertMarkdown, async {
            Ok(StagePayload::Text(convert_markdown(&text)))
        })
        .await?;
        let markdown = handoff(&converted)?.payload.into_text()?;

        let saved = timed(report, StageName::SaveResult, async {
            let path = self.artifacts.save(&conf.task_id, &markdown).await?;
            Ok(StagePayload::Text(path.to_string_lossy().into_owned()))
        })
        .await?;

        Ok(PathBuf::from(saved.payload.into_text()?))
    }
}

/// Run one stage, recording its duration and outcome in the report.
async fn timed<F>(
    report: &mut RunReport,
    stage: StageName,
    work: F,
) -> Result<StageResult, StageError>
where
    F: Future<Output = Result<StagePayload, StageError>>,
{
    let started = Instant::now();
    let outcome = work.await;
    let elapsed = started.elapsed();

    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .observe(elapsed.as_secs_f64());

    let duration_ms = elapsed.as_millis() as u64;
    match outcome {
        Ok(payload) => {
            debug!("Stage {} produced {} bytes", stage, payload.len());
            report.stages.push(StageRecord {
                stage,
                ok: true,
                duration_ms,
                output_bytes: payload.len(),
                error: None,
            });
            Ok(StageResult::ok(stage, payload))
        }
        Err(e) => {
            metrics::STAGE_FAILURES
                .with_label_values(&[stage.as_str(), e.kind()])
                .inc();
            report.stages.push(StageRecord {
                stage,
                ok: false,
                duration_ms,
                output_bytes: 0,
                error: Some(e.to_string()),
            });
            Err(e)
        }
    }
}

/// Pass a stage result across a boundary through the wire codec.
fn handoff(result: &StageResult) -> Result<StageResult, StageError> {
    let decoded = codec::decode(&codec::encode(result)?)?;
    if decoded.stage != result.stage || !decoded.ok {
        return Err(StageError::Codec(format!(
            "unexpected envelope from stage {}",
            result.stage
        )));
    }
    Ok(decoded)
}
