//! Mock fetcher for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::stages::{Fetcher, StageError};

/// Mock implementation of the Fetcher trait.
///
/// Serves documents registered with [`MockFetcher::add_document`]; any other
/// URL fails like an HTTP 404.
///
/// # Example
///
/// ```rust,ignore
/// use pdfpipe_core::testing::{MockExtractor, MockFetcher};
///
/// let fetcher = MockFetcher::new();
/// fetcher.add_document("http://host/a.pdf", MockExtractor::document(&["Page1"])).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    /// Documents by URL.
    documents: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// URLs requested so far.
    fetched: Arc<RwLock<Vec<String>>>,
    /// If set, the next fetch will fail with this error.
    next_error: Arc<RwLock<Option<StageError>>>,
}

impl MockFetcher {
    /// Create a new mock fetcher with no documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub async fn add_document(&self, url: &str, body: Vec<u8>) {
        self.documents.write().await.insert(url.to_string(), body);
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: StageError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get all URLs requested so far.
    pub async fn fetched_urls(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StageError> {
        self.fetched.write().await.push(url.to_string());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.documents
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| StageError::Network(format!("failed to fetch {}: HTTP 404 Not Found", url)))
    }
}
