//! Pipeline stage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Upper bound on a document download, in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_download_timeout_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the download timeout.
    pub fn with_download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.download_timeout_secs, 60);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PipelineConfig = toml::from_str(r#"output_dir = "/data/md""#).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/data/md"));
        assert_eq!(config.download_timeout_secs, 60);
    }
}
