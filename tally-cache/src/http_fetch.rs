//! HTTP page fetch for use with [`MemoizedFetcher`](crate::MemoizedFetcher).

use crate::error::{CacheError, CacheResult};
use crate::fetcher::Fetch;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Fetches resources as URLs with a GET request and returns the body text.
///
/// Non-success statuses are errors, so error pages are never memoized.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tally_cache::*;
///
/// # async fn example() -> CacheResult<()> {
/// let pages = MemoizedFetcher::new(Arc::new(MemoryStore::new()), HttpFetch::new()?);
/// let body = pages.get("http://example.com").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    /// Create a fetcher with a 30 second request timeout.
    pub fn new() -> CacheResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> CacheResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create a fetcher from an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, resource: &str) -> CacheResult<String> {
        let response = self.client.get(resource).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Fetch(format!("{resource} returned {status}")));
        }

        let body = response.text().await?;
        debug!(url = resource, status = status.as_u16(), size = body.len(), "Fetched page");
        Ok(body)
    }
}
