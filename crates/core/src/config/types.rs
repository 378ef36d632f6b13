use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::engine::{EngineBackend, EngineConfig, LocalEngineConfig};
use crate::queue::QueueConfig;
use crate::stages::PipelineConfig;
use crate::worker::WorkerConfig;

/// Root configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

/// Where the job queue is stored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pdfpipe.db")
}

/// Configuration safe to expose over the API (no credentials).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub engine: SanitizedEngineConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<SanitizedHttpEngineConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalEngineConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHttpEngineConfig {
    pub base_url: String,
    pub dag_id: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let engine = &config.engine;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            queue: config.queue.clone(),
            worker: config.worker.clone(),
            engine: SanitizedEngineConfig {
                backend: match engine.backend {
                    EngineBackend::Local => "local".to_string(),
                    EngineBackend::Http => "http".to_string(),
                },
                http: (engine.backend == EngineBackend::Http).then(|| SanitizedHttpEngineConfig {
                    base_url: engine.http.base_url.clone(),
                    dag_id: engine.http.dag_id.clone(),
                    username: engine.http.username.clone(),
                    password_configured: !engine.http.password.is_empty(),
                    timeout_secs: engine.http.timeout_secs,
                }),
                local: (engine.backend == EngineBackend::Local).then(|| engine.local.clone()),
            },
            pipeline: config.pipeline.clone(),
        }
    }
}
