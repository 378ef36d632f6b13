pub mod config;
pub mod engine;
pub mod gateway;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod stages;
pub mod testing;
pub mod worker;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig,
};
pub use engine::{
    EngineBackend, EngineConfig, EngineError, HttpEngine, LocalEngine, OrchestrationEngine,
    PipelineRun,
};
pub use gateway::{GatewayError, IdGenerator, SubmissionGateway, SubmitRequest, UuidIdGenerator};
pub use job::{Job, JobOptions, JobRecord, JobStatus, PipelineConf, QueueState};
pub use queue::{JobQueue, QueueConfig, QueueError, QueueStatus, SqliteJobQueue};
pub use stages::{
    FsArtifactStore, HttpFetcher, PdfTextExtractor, PipelineConfig, RunReport, RunState,
    StageError, StageName, StageRunner,
};
pub use worker::{RetryConfig, WorkerConfig, WorkerError, WorkerPool, WorkerStatus};
