use std::sync::Arc;

use pdfpipe_core::{Config, JobQueue, SanitizedConfig, SubmissionGateway, WorkerPool};

/// Shared application state
pub struct AppState {
    config: Config,
    gateway: SubmissionGateway,
    queue: Arc<dyn JobQueue>,
    /// None when workers are disabled in config.
    pool: Option<Arc<WorkerPool>>,
}

impl AppState {
    pub fn new(
        config: Config,
        gateway: SubmissionGateway,
        queue: Arc<dyn JobQueue>,
        pool: Option<Arc<WorkerPool>>,
    ) -> Self {
        Self {
            config,
            gateway,
            queue,
            pool,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn gateway(&self) -> &SubmissionGateway {
        &self.gateway
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn pool(&self) -> Option<&Arc<WorkerPool>> {
        self.pool.as_ref()
    }
}
