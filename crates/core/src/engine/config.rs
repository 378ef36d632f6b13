//! Orchestration engine configuration.

use serde::{Deserialize, Serialize};

/// Which engine runs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Run stages in this process.
    #[default]
    Local,
    /// Trigger runs on an external DAG engine over HTTP.
    Http,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: EngineBackend,

    #[serde(default)]
    pub http: HttpEngineConfig,

    #[serde(default)]
    pub local: LocalEngineConfig,
}

/// External DAG engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEngineConfig {
    /// Engine base URL, e.g. `http://airflow-webserver:8080`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// DAG that implements the pipeline.
    #[serde(default = "default_dag_id")]
    pub dag_id: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_dag_id() -> String {
    "pdf_extraction_dag".to_string()
}

fn default_username() -> String {
    "airflow".to_string()
}

fn default_password() -> String {
    "airflow".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dag_id: default_dag_id(),
            username: default_username(),
            password: default_password(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// In-process engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEngineConfig {
    /// Maximum runs executing at once.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_max_concurrent_runs() -> usize {
    4
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}
