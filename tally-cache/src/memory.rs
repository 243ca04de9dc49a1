//! In-process key-value store.

use crate::error::{CacheError, CacheResult};
use crate::traits::KeyValueStore;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// In-memory store with the same semantics as the Redis backend.
///
/// Expiry is measured with `tokio::time::Instant`, so tests running on a
/// paused clock can move time forward with `tokio::time::advance`. Expired
/// entries are dropped when their key is next touched, and every
/// [`SWEEP_INTERVAL`] writes a sweep drops the ones nobody touches again.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    writes: Arc<AtomicU64>,
}

/// Number of `set` calls between sweeps of expired entries.
pub const SWEEP_INTERVAL: u64 = 256;

#[derive(Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Clone)]
enum Value {
    Bytes(Vec<u8>),
    List(VecDeque<Vec<u8>>),
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Deadline `ttl` from now. A TTL past the end of the clock never expires.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, entry| entry.is_live(now));
        before - data.len()
    }
}

fn live<'a>(data: &'a HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
    data.get(key).filter(|entry| entry.is_live(Instant::now()))
}

/// Drop the entry for `key` if it has expired.
fn purge_expired(data: &mut HashMap<String, Entry>, key: &str) {
    if data.get(key).is_some_and(|entry| !entry.is_live(Instant::now())) {
        data.remove(key);
    }
}

fn push(data: &mut HashMap<String, Entry>, key: &str, value: Vec<u8>) -> CacheResult<u64> {
    purge_expired(data, key);
    let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
        value: Value::List(VecDeque::new()),
        expires_at: None,
    });

    match &mut entry.value {
        Value::List(list) => {
            list.push_back(value);
            Ok(list.len() as u64)
        }
        Value::Bytes(_) => Err(CacheError::WrongType(key.to_string())),
    }
}

/// Resolve Redis-style inclusive bounds against a list length.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let data = self.data.read().await;
        match live(&data, key).map(|entry| &entry.value) {
            Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(Value::List(_)) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            value: Value::Bytes(value),
            expires_at: ttl.and_then(deadline),
        };
        self.data.write().await.insert(key.to_string(), entry);

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            let swept = self.sweep().await;
            if swept > 0 {
                debug!(swept, "Dropped expired entries");
            }
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        purge_expired(&mut data, key);
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let data = self.data.read().await;
        Ok(live(&data, key).is_some())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut data = self.data.write().await;
        purge_expired(&mut data, key);
        let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Bytes(b"0".to_vec()),
            expires_at: None,
        });

        let Value::Bytes(bytes) = &mut entry.value else {
            return Err(CacheError::WrongType(key.to_string()));
        };
        let current: i64 = std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| CacheError::WrongType(key.to_string()))?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
        *bytes = next.to_string().into_bytes();

        Ok(next)
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> CacheResult<u64> {
        let mut data = self.data.write().await;
        push(&mut data, key, value)
    }

    async fn append_pair(
        &self,
        first: (&str, Vec<u8>),
        second: (&str, Vec<u8>),
    ) -> CacheResult<()> {
        let mut data = self.data.write().await;

        // Check both targets up front so a type error leaves neither list touched.
        for key in [first.0, second.0] {
            purge_expired(&mut data, key);
            if let Some(Entry {
                value: Value::Bytes(_),
                ..
            }) = data.get(key)
            {
                return Err(CacheError::WrongType(key.to_string()));
            }
        }

        push(&mut data, first.0, first.1)?;
        push(&mut data, second.0, second.1)?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<Vec<u8>>> {
        let data = self.data.read().await;
        let list = match live(&data, key).map(|entry| &entry.value) {
            Some(Value::List(list)) => list,
            Some(Value::Bytes(_)) => return Err(CacheError::WrongType(key.to_string())),
            None => return Ok(Vec::new()),
        };

        Ok(match resolve_range(list.len(), start, stop) {
            Some((start, stop)) => list.range(start..=stop).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        purge_expired(&mut data, key);
        match data.get_mut(key) {
            Some(entry) => {
                entry.expires_at = deadline(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn flush_all(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_exists() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(!store.exists("missing").await.unwrap());

        store.set("key", b"value".to_vec(), None).await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), Some(b"value".to_vec()));
        assert!(store.exists("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("key", b"first".to_vec()).await.unwrap());
        assert!(!store.set_if_absent("key", b"second".to_vec()).await.unwrap());
        assert_eq!(store.get("key").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_incr_creates_and_counts() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);
        assert_eq!(store.get("counter").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_incr_rejects_non_numeric() {
        let store = MemoryStore::new();
        store.set("text", b"cake".to_vec(), None).await.unwrap();
        assert!(matches!(
            store.incr("text").await,
            Err(CacheError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn test_lists() {
        let store = MemoryStore::new();
        for item in ["a", "b", "c", "d"] {
            store.rpush("list", item.as_bytes().to_vec()).await.unwrap();
        }

        let all = store.lrange("list", 0, -1).await.unwrap();
        assert_eq!(all, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

        let middle = store.lrange("list", 1, 2).await.unwrap();
        assert_eq!(middle, vec![b"b".to_vec(), b"c".to_vec()]);

        let tail = store.lrange("list", -2, 100).await.unwrap();
        assert_eq!(tail, vec![b"c".to_vec(), b"d".to_vec()]);

        assert!(store.lrange("list", 3, 1).await.unwrap().is_empty());
        assert!(store.lrange("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.rpush("list", b"a".to_vec()).await.unwrap();
        store.set("plain", b"x".to_vec(), None).await.unwrap();

        assert!(matches!(store.get("list").await, Err(CacheError::WrongType(_))));
        assert!(matches!(
            store.rpush("plain", b"y".to_vec()).await,
            Err(CacheError::WrongType(_))
        ));
        assert!(matches!(
            store.lrange("plain", 0, -1).await,
            Err(CacheError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn test_append_pair_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.set("plain", b"x".to_vec(), None).await.unwrap();

        let result = store
            .append_pair(("inputs", b"1".to_vec()), ("plain", b"2".to_vec()))
            .await;
        assert!(matches!(result, Err(CacheError::WrongType(_))));
        assert!(!store.exists("inputs").await.unwrap());

        store
            .append_pair(("inputs", b"1".to_vec()), ("outputs", b"2".to_vec()))
            .await
            .unwrap();
        assert_eq!(store.lrange("inputs", 0, -1).await.unwrap(), vec![b"1".to_vec()]);
        assert_eq!(store.lrange("outputs", 0, -1).await.unwrap(), vec![b"2".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store
            .set("short", b"v".to_vec(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.exists("short").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("short").await.unwrap());
        assert_eq!(store.get("short").await.unwrap(), None);

        // An expired key is free again.
        assert!(store.set_if_absent("short", b"new".to_vec()).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire() {
        let store = MemoryStore::new();
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());

        store.set("key", b"v".to_vec(), None).await.unwrap();
        assert!(store.expire("key", Duration::from_secs(1)).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_all() {
        let store = MemoryStore::new();
        store.set("a", b"1".to_vec(), None).await.unwrap();
        store.rpush("b", b"2".to_vec()).await.unwrap();
        assert_eq!(store.len().await, 2);

        store.flush_all().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_incr_overflow() {
        let store = MemoryStore::new();
        store
            .set("max", i64::MAX.to_string().into_bytes(), None)
            .await
            .unwrap();

        assert!(matches!(store.incr("max").await, Err(CacheError::Overflow(_))));
        assert_eq!(
            store.get("max").await.unwrap(),
            Some(i64::MAX.to_string().into_bytes())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = MemoryStore::new();
        store
            .set("forever", b"v".to_vec(), Some(Duration::MAX))
            .await
            .unwrap();
        store.set("plain", b"v".to_vec(), None).await.unwrap();
        assert!(store.expire("plain", Duration::MAX).await.unwrap());

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert!(store.exists("forever").await.unwrap());
        assert!(store.exists("plain").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_untouched_expired_entries() {
        let store = MemoryStore::new();
        for n in 0..10 {
            store
                .set(&format!("cache:{n}"), b"v".to_vec(), Some(Duration::from_secs(1)))
                .await
                .unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.data.read().await.len(), 10);

        for n in 10..SWEEP_INTERVAL {
            store.set(&format!("live:{n}"), b"v".to_vec(), None).await.unwrap();
        }
        assert_eq!(store.data.read().await.len() as u64, SWEEP_INTERVAL - 10);
        assert_eq!(store.sweep().await, 0);
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(4, 0, -1), Some((0, 3)));
        assert_eq!(resolve_range(4, -10, 1), Some((0, 1)));
        assert_eq!(resolve_range(4, 5, 10), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(4, 0, -5), None);
    }
}
