//! Key-value store trait definition.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Capabilities the cache layer needs from a key-value store.
///
/// Every method is a single atomic operation on the store. Implementations
/// follow Redis semantics: counters live in plain string entries, lists are a
/// separate kind of entry, and mixing the two is a type error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the raw bytes stored under a key.
    ///
    /// Returns `Ok(None)` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Create or overwrite an entry.
    ///
    /// # Arguments
    ///
    /// * `key` - The key
    /// * `value` - The raw value
    /// * `ttl` - Optional time-to-live, applied atomically with the write
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Create an entry only if the key is absent.
    ///
    /// Returns `true` if the value was written.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> CacheResult<bool>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Increment a counter by one, creating it at 0 first if absent.
    ///
    /// Returns the new value.
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// Append a value to the tail of a list, creating the list if absent.
    ///
    /// Returns the new list length.
    async fn rpush(&self, key: &str, value: Vec<u8>) -> CacheResult<u64>;

    /// Append one value to each of two lists as a single atomic unit.
    ///
    /// No other append to either list can land between the two.
    async fn append_pair(
        &self,
        first: (&str, Vec<u8>),
        second: (&str, Vec<u8>),
    ) -> CacheResult<()>;

    /// Read a slice of a list.
    ///
    /// Bounds are inclusive; negative indices count back from the tail, so
    /// `lrange(key, 0, -1)` reads the whole list. A missing key reads as an
    /// empty list.
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<Vec<u8>>>;

    /// Set a relative expiry on an existing entry.
    ///
    /// Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Clear all entries.
    ///
    /// **Warning:** This removes every key in the store, not only the ones
    /// this crate wrote.
    async fn flush_all(&self) -> CacheResult<()>;
}
