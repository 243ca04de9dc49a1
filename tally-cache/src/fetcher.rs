//! TTL-bounded memoization of an idempotent fetch.

use crate::config::{CacheConfig, DEFAULT_FETCH_TTL};
use crate::error::CacheResult;
use crate::traits::KeyValueStore;
use crate::value;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The expensive, idempotent work being memoized.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the body of `resource`.
    async fn fetch(&self, resource: &str) -> CacheResult<String>;
}

/// Adapter turning an async closure into a [`Fetch`].
///
/// # Examples
///
/// ```
/// use tally_cache::{CacheResult, FnFetch};
///
/// let fetch = FnFetch::new(|url: String| async move { CacheResult::Ok(format!("body of {url}")) });
/// ```
pub struct FnFetch<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnFetch<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = CacheResult<String>> + Send,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _future: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Fetch for FnFetch<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = CacheResult<String>> + Send,
{
    async fn fetch(&self, resource: &str) -> CacheResult<String> {
        (self.f)(resource.to_string()).await
    }
}

/// Serves repeated fetches of a resource from the store for a fixed TTL.
///
/// Every [`get`](Self::get) bumps the counter `count:<resource>`, hit or
/// miss. The body is cached under `cache:<resource>` and expires through the
/// store's own TTL, after which the next `get` fetches again.
pub struct MemoizedFetcher<F> {
    store: Arc<dyn KeyValueStore>,
    fetch: F,
    ttl: Duration,
}

impl<F: Fetch> MemoizedFetcher<F> {
    /// Wrap `fetch` with the default TTL of 10 seconds.
    pub fn new(store: Arc<dyn KeyValueStore>, fetch: F) -> Self {
        Self {
            store,
            fetch,
            ttl: DEFAULT_FETCH_TTL,
        }
    }

    /// Wrap `fetch` with the TTL from `config`.
    pub fn from_config(store: Arc<dyn KeyValueStore>, fetch: F, config: &CacheConfig) -> Self {
        Self::new(store, fetch).with_ttl(config.fetch_ttl)
    }

    /// Set the TTL of cached bodies.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the TTL of cached bodies.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the wrapped fetch.
    pub fn inner(&self) -> &F {
        &self.fetch
    }

    /// Get the body of `resource`, fetching only if no live copy is cached.
    pub async fn get(&self, resource: &str) -> CacheResult<String> {
        let requests = self.store.incr(&count_key(resource)).await?;

        let cache_key = cache_key(resource);
        if let Some(bytes) = self.store.get(&cache_key).await? {
            debug!(resource, requests, "Fetch cache hit");
            return Ok(value::utf8(bytes)?);
        }

        debug!(resource, requests, "Fetch cache miss");
        let body = self.fetch.fetch(resource).await?;
        self.store
            .set(&cache_key, body.as_bytes().to_vec(), Some(self.ttl))
            .await?;
        Ok(body)
    }

    /// Number of [`get`](Self::get) calls made for `resource`.
    pub async fn request_count(&self, resource: &str) -> CacheResult<i64> {
        match self.store.get(&count_key(resource)).await? {
            Some(bytes) => Ok(value::integer(bytes)?),
            None => Ok(0),
        }
    }
}

/// Key of the request counter for `resource`.
pub fn count_key(resource: &str) -> String {
    format!("count:{resource}")
}

/// Key of the cached body for `resource`.
pub fn cache_key(resource: &str) -> String {
    format!("cache:{resource}")
}
