//! Orchestration engines that execute pipeline runs.
//!
//! [`LocalEngine`] runs the stages in this process, [`HttpEngine`] hands runs
//! to an external DAG engine.

mod config;
mod http;
mod local;
mod traits;
mod types;

pub use config::{EngineBackend, EngineConfig, HttpEngineConfig, LocalEngineConfig};
pub use http::HttpEngine;
pub use local::LocalEngine;
pub use traits::OrchestrationEngine;
pub use types::{EngineError, PipelineRun};
