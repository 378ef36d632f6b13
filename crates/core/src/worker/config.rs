//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Enable/disable the workers.
    /// When disabled, jobs are accepted and queued but never triggered.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of independent worker loops.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound on one trigger call (seconds).
    #[serde(default = "default_trigger_timeout")]
    pub trigger_timeout_secs: u64,

    /// How often expired leases are swept (milliseconds).
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,

    /// How often the engine is polled for run outcomes (milliseconds).
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_ms: u64,

    /// Retry policy for failed trigger calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry configuration for trigger calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum trigger attempts per delivery, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_trigger_timeout() -> u64 {
    30
}

fn default_reap_interval() -> u64 {
    5000 // 5 seconds
}

fn default_monitor_interval() -> u64 {
    2000 // 2 seconds
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000 // 1 second
}

fn default_max_delay() -> u64 {
    30_000 // 30 seconds
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1 for the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            concurrency: default_concurrency(),
            trigger_timeout_secs: default_trigger_timeout(),
            reap_interval_ms: default_reap_interval(),
            monitor_interval_ms: default_monitor_interval(),
            retry: RetryConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Sets the number of workers.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the trigger timeout.
    pub fn with_trigger_timeout_secs(mut self, secs: u64) -> Self {
        self.trigger_timeout_secs = secs;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the reaper and monitor intervals.
    pub fn with_intervals(mut self, reap_interval_ms: u64, monitor_interval_ms: u64) -> Self {
        self.reap_interval_ms = reap_interval_ms;
        self.monitor_interval_ms = monitor_interval_ms;
        self
    }

    /// Longest a worker can spend triggering one delivery, all retries included.
    ///
    /// The queue's visibility timeout must exceed this, or a slow trigger
    /// could see its lease reaped and the job delivered twice.
    pub fn worst_case_trigger_time(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let calls = Duration::from_secs(self.trigger_timeout_secs) * attempts;
        let delays: Duration = (1..attempts).map(|retry| self.retry.delay_for(retry)).sum();
        calls + delays
    }
}
