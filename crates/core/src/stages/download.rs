//! Download stage: fetch the source document.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::types::StageError;

/// Fetches a document by URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StageError>;
}

/// HTTP fetcher backed by `reqwest`, with a bounded request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("pdfpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StageError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> StageError {
        if e.is_timeout() {
            StageError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            StageError::Network(format!("failed to fetch {}: {}", url, e))
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StageError> {
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Network(format!(
                "failed to fetch {}: HTTP {}",
                url, status
            )));
        }

        let body = response.bytes().await.map_err(|e| self.map_error(url, e))?;
        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
