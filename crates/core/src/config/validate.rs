use super::{types::Config, ConfigError};
use crate::engine::EngineBackend;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker concurrency and retry attempts are at least 1
/// - Leases outlive the slowest possible trigger, so a job being triggered
///   is never redelivered
/// - The HTTP engine has a usable base URL when selected
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Worker validation
    if config.worker.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "worker.concurrency must be at least 1".to_string(),
        ));
    }
    if config.worker.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "worker.retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if config.worker.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "worker.retry.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }

    // Queue validation
    if config.queue.max_deliveries == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_deliveries must be at least 1".to_string(),
        ));
    }
    let worst_case_ms = config.worker.worst_case_trigger_time().as_millis();
    if u128::from(config.queue.visibility_timeout_ms) <= worst_case_ms {
        return Err(ConfigError::ValidationError(format!(
            "queue.visibility_timeout_ms ({}) must exceed the worst-case trigger time ({} ms)",
            config.queue.visibility_timeout_ms, worst_case_ms
        )));
    }

    // Engine validation
    if config.engine.backend == EngineBackend::Http {
        let base_url = &config.engine.http.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "engine.http.base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }
        if config.engine.http.dag_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.http.dag_id cannot be empty".to_string(),
            ));
        }
    }
    if config.engine.backend == EngineBackend::Local && config.engine.local.max_concurrent_runs == 0
    {
        return Err(ConfigError::ValidationError(
            "engine.local.max_concurrent_runs must be at least 1".to_string(),
        ));
    }

    // Pipeline validation
    if config.pipeline.download_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.download_timeout_secs must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = Config::default();
        config.worker.concurrency = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_lease_shorter_than_trigger_fails() {
        let mut config = Config::default();
        config.worker.trigger_timeout_secs = 60;
        config.worker.retry.max_attempts = 5;
        config.queue.visibility_timeout_ms = 60_000;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("visibility_timeout_ms"));
    }

    #[test]
    fn test_validate_http_engine_url() {
        let mut config = Config::default();
        config.engine.backend = EngineBackend::Http;
        config.engine.http.base_url = "airflow:8080".to_string();
        assert!(validate_config(&config).is_err());

        config.engine.http.base_url = "http://airflow:8080".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
