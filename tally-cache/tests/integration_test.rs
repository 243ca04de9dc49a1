//! Integration tests for tally-cache

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tally_cache::*;

fn service() -> Arc<CacheService> {
    Arc::new(CacheService::new(
        Arc::new(MemoryStore::new()),
        CacheConfig::default(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_get_distinct_keys() {
    let cache = service();

    let handles: Vec<_> = (0..200)
        .map(|n| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.store(n).await })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in futures::future::join_all(handles).await {
        keys.insert(handle.unwrap().unwrap());
    }
    assert_eq!(keys.len(), 200);

    let id = OperationId::new(STORE_OPERATION);
    assert_eq!(cache.calls(&id).await.unwrap(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_history_stays_paired() {
    let cache = service();

    let handles: Vec<_> = (0..100)
        .map(|n| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.store(format!("value-{n}")).await })
        })
        .collect();
    futures::future::join_all(handles).await;

    let replay = ReplayEngine::for_service(&cache)
        .replay(&OperationId::new(STORE_OPERATION))
        .await
        .unwrap();
    assert_eq!(replay.calls, 100);
    assert_eq!(replay.entries.len(), 100);

    // Each recorded output is the key the recorded input was stored under.
    for entry in &replay.entries {
        let input: String = serde_json::from_str(&entry.input).unwrap();
        assert_eq!(cache.get_string(&entry.output).await.unwrap(), Some(input));
    }
}

/// Looks a word up in the cache service by a key it was stored under.
struct Lookup;

#[async_trait]
impl Operation for Lookup {
    type Input = String;
    type Output = Option<String>;

    fn id(&self) -> OperationId {
        OperationId::new("Dictionary.lookup")
    }

    async fn call(&self, cache: &CacheService, key: String) -> CacheResult<Option<String>> {
        cache.get_string(&key).await
    }
}

#[tokio::test]
async fn test_instrumented_custom_operation_replays() {
    let cache = service();
    let lookup = cache.instrument(Lookup);

    let key = cache.store("cake").await.unwrap();
    assert_eq!(lookup.call(&cache, key.clone()).await.unwrap(), Some("cake".to_string()));
    assert_eq!(lookup.call(&cache, "missing".to_string()).await.unwrap(), None);

    let replay = ReplayEngine::for_service(&cache).replay(&lookup.id()).await.unwrap();
    assert_eq!(replay.calls, 2);
    assert_eq!(
        replay.to_string(),
        format!(
            "Dictionary.lookup was called 2 times:\n\
             Dictionary.lookup(\"{key}\") -> cake\n\
             Dictionary.lookup(\"missing\") -> null"
        )
    );

    // The store operation keeps its own, independent history.
    let stores = ReplayEngine::for_service(&cache)
        .replay(&OperationId::new(STORE_OPERATION))
        .await
        .unwrap();
    assert_eq!(stores.calls, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetches_count_every_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher = Arc::new(MemoizedFetcher::new(
        Arc::new(MemoryStore::new()),
        FnFetch::new(move |url: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                CacheResult::Ok(format!("page {url}"))
            }
        }),
    ));

    // Prime the cache, then hammer it.
    fetcher.get("http://example.test").await.unwrap();
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.get("http://example.test").await })
        })
        .collect();
    for handle in futures::future::join_all(handles).await {
        assert_eq!(handle.unwrap().unwrap(), "page http://example.test");
    }

    assert_eq!(fetcher.request_count("http://example.test").await.unwrap(), 51);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_ttl_follows_config() {
    let config = CacheConfig::default().with_fetch_ttl(Duration::from_secs(3));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher = MemoizedFetcher::from_config(
        Arc::new(MemoryStore::new()),
        FnFetch::new(move |_url: String| {
            let counter = counter.clone();
            async move { CacheResult::Ok(counter.fetch_add(1, Ordering::SeqCst).to_string()) }
        }),
        &config,
    );

    assert_eq!(fetcher.get("r").await.unwrap(), "0");
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(fetcher.get("r").await.unwrap(), "0");
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(fetcher.get("r").await.unwrap(), "1");
}

// Note: These tests require Redis running on localhost:6379
// They are disabled by default but can be run with: cargo test -- --ignored

#[cfg(feature = "redis")]
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_service_round_trip() {
    let config = CacheConfig::redis("redis://localhost:6379");
    let store = Arc::new(RedisStore::connect(&config).await.unwrap());
    let cache = CacheService::open(store, config).await.unwrap();

    let key = cache.store("cake").await.unwrap();
    assert_eq!(cache.get_string(&key).await.unwrap(), Some("cake".to_string()));

    let key = cache.store(42).await.unwrap();
    assert_eq!(cache.get_int(&key).await.unwrap(), Some(42));

    let replay = ReplayEngine::for_service(&cache)
        .replay(&OperationId::new(STORE_OPERATION))
        .await
        .unwrap();
    assert_eq!(replay.calls, 2);
    assert_eq!(replay.entries.len(), 2);
}
