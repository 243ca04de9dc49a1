//! Caching and call instrumentation over a key-value store.
//!
//! Stores opaque values under freshly minted unique keys, counts and
//! records calls to instrumented operations for later replay, and memoizes
//! an idempotent fetch for a fixed TTL.
//!
//! # Features
//!
//! - `redis` - Redis-backed [`KeyValueStore`] (enabled by default)
//! - `http` - [`HttpFetch`], a page fetch for [`MemoizedFetcher`]
//!
//! # Examples
//!
//! ## Storing values
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_cache::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let config = CacheConfig::redis("redis://localhost:6379");
//!     let store = Arc::new(RedisStore::connect(&config).await?);
//!     let cache = CacheService::open(store, config).await?;
//!
//!     let key = cache.store(42).await?;
//!     assert_eq!(cache.get_int(&key).await?, Some(42));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Replaying calls
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_cache::*;
//!
//! # async fn example() -> CacheResult<()> {
//! let cache = CacheService::new(Arc::new(MemoryStore::new()), CacheConfig::default());
//! cache.store("foo").await?;
//! cache.store("bar").await?;
//!
//! let replay = ReplayEngine::for_service(&cache)
//!     .replay(&OperationId::new(STORE_OPERATION))
//!     .await?;
//! println!("{replay}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Memoizing a fetch
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tally_cache::*;
//!
//! # async fn example() -> CacheResult<()> {
//! let fetch = FnFetch::new(|url: String| async move { CacheResult::Ok(format!("body of {url}")) });
//! let pages = MemoizedFetcher::new(Arc::new(MemoryStore::new()), fetch)
//!     .with_ttl(Duration::from_secs(10));
//!
//! let body = pages.get("http://example.com").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod memory;
pub mod recorder;
pub mod registry;
pub mod replay;
pub mod service;
pub mod traits;
pub mod value;

#[cfg(feature = "redis")]
pub mod redis_store;

#[cfg(feature = "http")]
pub mod http_fetch;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, DecodeError};
pub use fetcher::{Fetch, FnFetch, MemoizedFetcher};
pub use memory::MemoryStore;
pub use recorder::{CallHistory, CountCalls, InvocationRecorder, Operation};
pub use registry::{Instrumentation, OperationId, OperationRegistry};
pub use replay::{Replay, ReplayEngine, ReplayEntry};
pub use service::{CacheService, STORE_OPERATION};
pub use traits::KeyValueStore;
pub use value::CacheValue;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

#[cfg(feature = "http")]
pub use http_fetch::HttpFetch;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, CacheResult, DecodeError};
    pub use crate::fetcher::{Fetch, FnFetch, MemoizedFetcher};
    pub use crate::memory::MemoryStore;
    pub use crate::recorder::{CallHistory, CountCalls, Operation};
    pub use crate::registry::{OperationId, OperationRegistry};
    pub use crate::replay::{Replay, ReplayEngine};
    pub use crate::service::{CacheService, STORE_OPERATION};
    pub use crate::traits::KeyValueStore;
    pub use crate::value::CacheValue;

    #[cfg(feature = "redis")]
    pub use crate::redis_store::RedisStore;

    #[cfg(feature = "http")]
    pub use crate::http_fetch::HttpFetch;
}
