//! The cache service: unique keys, opaque values, typed decoders.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, DecodeError};
use crate::recorder::{CallHistory, CountCalls, Operation};
use crate::registry::{OperationId, OperationRegistry};
use crate::traits::KeyValueStore;
use crate::value::{self, CacheValue};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of the instrumented [`CacheService::store`] operation.
pub const STORE_OPERATION: &str = "Cache.store";

/// Stores values under freshly minted keys and reads them back.
///
/// Every call to [`store`](Self::store) is counted and recorded under
/// [`STORE_OPERATION`]; see [`ReplayEngine`](crate::ReplayEngine) for reading
/// the history back.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tally_cache::*;
///
/// # async fn example() -> CacheResult<()> {
/// let cache = CacheService::open(Arc::new(MemoryStore::new()), CacheConfig::default()).await?;
///
/// let key = cache.store("cake").await?;
/// assert_eq!(cache.get_string(&key).await?, Some("cake".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    registry: OperationRegistry,
    store_op: CountCalls<CallHistory<StoreOperation>>,
}

impl CacheService {
    /// Create a service over `store` without touching existing data.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        let registry = OperationRegistry::new();
        let store_op = CountCalls::new(
            CallHistory::new(StoreOperation, store.clone(), &registry),
            store.clone(),
            &registry,
        );

        Self {
            store,
            config,
            registry,
            store_op,
        }
    }

    /// Create a service, clearing the store first if the configuration asks for it.
    pub async fn open(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        if config.flush_on_start {
            store.flush_all().await?;
            info!("Flushed key-value store on open");
        }
        Ok(Self::new(store, config))
    }

    /// Get the underlying store handle.
    pub fn store_handle(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Get the registry of instrumented operations.
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Get the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Generate a key not currently present in the store.
    ///
    /// Keys are random UUIDs, so the existence check almost never retries.
    /// Gives up with [`CacheError::KeyGenerationExhausted`] after
    /// `max_key_attempts` taken keys in a row.
    pub async fn generate_key(&self) -> CacheResult<String> {
        let attempts = self.config.max_key_attempts;
        for _ in 0..attempts {
            if let Some(key) = self.unused_key().await? {
                return Ok(key);
            }
        }
        Err(CacheError::KeyGenerationExhausted { attempts })
    }

    /// One key generation attempt: a fresh key, or `None` if it is taken.
    async fn unused_key(&self) -> CacheResult<Option<String>> {
        let key = Uuid::new_v4().to_string();
        if self.store.exists(&key).await? {
            warn!(key = %key, "Generated key already exists; retrying");
            return Ok(None);
        }
        Ok(Some(key))
    }

    /// Store `data` under a new key and return the key.
    ///
    /// Counted and recorded under [`STORE_OPERATION`].
    pub async fn store(&self, data: impl Into<CacheValue> + Send) -> CacheResult<String> {
        self.store_op.call(self, data.into()).await
    }

    /// The uninstrumented write behind [`store`](Self::store).
    ///
    /// The write is conditional, so a key claimed by a concurrent writer
    /// between the existence check and the write is never overwritten.
    /// Taken keys and lost races draw on the same `max_key_attempts` budget.
    async fn insert(&self, data: CacheValue) -> CacheResult<String> {
        let bytes = data.to_bytes();
        let attempts = self.config.max_key_attempts;

        for _ in 0..attempts {
            let Some(key) = self.unused_key().await? else {
                continue;
            };
            if self.store.set_if_absent(&key, bytes.clone()).await? {
                debug!(key = %key, size = bytes.len(), "Stored value");
                return Ok(key);
            }
            warn!(key = %key, "Key claimed by a concurrent writer; retrying");
        }
        Err(CacheError::KeyGenerationExhausted { attempts })
    }

    /// Get the raw bytes stored under `key`, or `None` if absent.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.store.get(key).await
    }

    /// Get the value under `key` decoded with `decode`.
    ///
    /// A missing key is `Ok(None)`; a decode failure is
    /// [`CacheError::Decode`].
    pub async fn get_with<T, F>(&self, key: &str, decode: F) -> CacheResult<Option<T>>
    where
        F: FnOnce(Vec<u8>) -> Result<T, DecodeError>,
    {
        match self.store.get(key).await? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Get the value under `key` as UTF-8 text.
    pub async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.get_with(key, value::utf8).await
    }

    /// Get the value under `key` as an integer.
    pub async fn get_int(&self, key: &str) -> CacheResult<Option<i64>> {
        self.get_with(key, value::integer).await
    }

    /// Get the value under `key` as a float.
    pub async fn get_float(&self, key: &str) -> CacheResult<Option<f64>> {
        self.get_with(key, value::float).await
    }

    /// Number of counted calls to `operation` (0 if never called).
    pub async fn calls(&self, operation: &OperationId) -> CacheResult<i64> {
        Ok(self.get_int(operation.counter_key()).await?.unwrap_or(0))
    }

    /// Wrap `op` with call counting and call history, registered with this service.
    pub fn instrument<O>(&self, op: O) -> CountCalls<CallHistory<O>>
    where
        O: Operation,
        O::Input: Serialize,
        O::Output: Serialize,
    {
        CountCalls::new(
            CallHistory::new(op, self.store.clone(), &self.registry),
            self.store.clone(),
            &self.registry,
        )
    }
}

/// The operation behind [`CacheService::store`].
struct StoreOperation;

#[async_trait]
impl Operation for StoreOperation {
    type Input = CacheValue;
    type Output = String;

    fn id(&self) -> OperationId {
        OperationId::new(STORE_OPERATION)
    }

    async fn call(&self, cache: &CacheService, input: CacheValue) -> CacheResult<String> {
        cache.insert(input).await
    }
}
