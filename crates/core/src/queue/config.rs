//! Queue configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How long a delivered job stays leased before it may be redelivered (milliseconds).
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_ms: u64,

    /// Maximum number of deliveries per job.
    /// A lease that expires on the last delivery settles the job as failed.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    /// Fallback wake-up interval for blocked dequeues (milliseconds).
    /// Covers jobs enqueued by another process sharing the database file.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_visibility_timeout() -> u64 {
    300_000 // 5 minutes
}

fn default_max_deliveries() -> u32 {
    3
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_ms: default_visibility_timeout(),
            max_deliveries: default_max_deliveries(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl QueueConfig {
    /// Sets the lease duration.
    pub fn with_visibility_timeout_ms(mut self, ms: u64) -> Self {
        self.visibility_timeout_ms = ms;
        self
    }

    /// Sets the delivery bound.
    pub fn with_max_deliveries(mut self, max: u32) -> Self {
        self.max_deliveries = max;
        self
    }

    /// Sets the dequeue poll interval.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.visibility_timeout_ms, 300_000);
        assert_eq!(config.max_deliveries, 3);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: QueueConfig = toml::from_str("max_deliveries = 5").unwrap();
        assert_eq!(config.max_deliveries, 5);
        assert_eq!(config.visibility_timeout_ms, 300_000);
    }
}
