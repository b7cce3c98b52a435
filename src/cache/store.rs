//! Cache storage contract and the in-process implementation.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{backend} cache backend failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
    #[error("{backend} cache `{op}` timed out after {}ms", .after.as_millis())]
    Timeout {
        backend: &'static str,
        op: &'static str,
        after: Duration,
    },
    #[error("cache payload could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache operation canceled")]
    Canceled,
}

impl CacheError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

/// Key-value store with per-entry time-to-live.
///
/// Keys are plain strings and values opaque bytes. Implementations report
/// failures honestly; the fail-open policy lives in [`super::CacheClient`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend label used in logs.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores `value` under `key`. A zero `ttl` stores nothing and drops any
    /// previous value.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every entry whose key starts with `prefix`, returning how many
    /// were dropped.
    async fn remove_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Current value of the counter stored under `counter`. A counter that was
    /// never bumped reads as zero.
    async fn generation(&self, counter: &str) -> Result<u64, CacheError>;

    /// Increments the counter under `counter` and returns the new value.
    /// Counters never expire.
    async fn bump_generation(&self, counter: &str) -> Result<u64, CacheError>;

    /// Stores `value` like [`CacheStore::set`], but only while the counter
    /// under `counter` still equals `expected`. The comparison and the write
    /// are atomic. Returns whether the value was stored.
    async fn set_if_generation(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        counter: &str,
        expected: u64,
    ) -> Result<bool, CacheError>;
}

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

struct LocalState {
    entries: LruCache<String, Entry>,
    generations: HashMap<String, u64>,
}

impl LocalState {
    fn store(&mut self, key: &str, value: Bytes, ttl: Duration) {
        if ttl.is_zero() {
            self.entries.pop(key);
            return;
        }
        let expires_at = Instant::now() + ttl;
        self.entries.put(key.to_string(), Entry { value, expires_at });
    }

    fn generation(&self, counter: &str) -> u64 {
        self.generations.get(counter).copied().unwrap_or(0)
    }
}

/// In-process store used when no networked backend is configured.
///
/// Bounded by LRU eviction; expired entries are dropped lazily when touched.
/// Generation counters live beside the entries and are never evicted.
pub struct LocalStore {
    state: RwLock<LocalState>,
}

impl LocalStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: RwLock::new(LocalState {
                entries: LruCache::new(capacity),
                generations: HashMap::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for LocalStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let mut state = rw_write(&self.state, SOURCE, "get");
        let lookup = state
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                state.entries.pop(key);
                debug!(key, "Dropped expired local cache entry");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        rw_write(&self.state, SOURCE, "set").store(key, value, ttl);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.state, SOURCE, "remove").entries.pop(key);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "remove_prefix");
        let doomed: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            state.entries.pop(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let state = rw_read(&self.state, SOURCE, "exists");
        Ok(state
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn generation(&self, counter: &str) -> Result<u64, CacheError> {
        Ok(rw_read(&self.state, SOURCE, "generation").generation(counter))
    }

    async fn bump_generation(&self, counter: &str) -> Result<u64, CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "bump_generation");
        let next = state.generation(counter).wrapping_add(1);
        state.generations.insert(counter.to_string(), next);
        Ok(next)
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        counter: &str,
        expected: u64,
    ) -> Result<bool, CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "set_if_generation");
        if state.generation(counter) != expected {
            return Ok(false);
        }
        state.store(key, value, ttl);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> LocalStore {
        LocalStore::new(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let store = store(8);
        store
            .set("catalog:product_1", Bytes::from_static(b"{}"), MINUTE)
            .await
            .expect("set");

        let value = store.get("catalog:product_1").await.expect("get");
        assert_eq!(value, Some(Bytes::from_static(b"{}")));
        assert!(store.exists("catalog:product_1").await.expect("exists"));
        assert_eq!(store.get("catalog:product_2").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = store(8);
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(5))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.exists("k").await.expect("exists"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("k").await.expect("exists"));
        assert_eq!(store.get("k").await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_stores_nothing() {
        let store = store(8);
        store
            .set("k", Bytes::from_static(b"v"), MINUTE)
            .await
            .expect("set");
        store
            .set("k", Bytes::from_static(b"w"), Duration::ZERO)
            .await
            .expect("set");
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn remove_prefix_drops_only_matching_keys() {
        let store = store(16);
        for key in [
            "catalog:products_list_c=Books;p=1",
            "catalog:products_list_c=Books;p=2",
            "catalog:product_42",
            "other:products_list_c=Books;p=1",
        ] {
            store
                .set(key, Bytes::from_static(b"x"), MINUTE)
                .await
                .expect("set");
        }

        let removed = store
            .remove_prefix("catalog:products_list_")
            .await
            .expect("remove prefix");

        assert_eq!(removed, 2);
        assert!(store.exists("catalog:product_42").await.expect("exists"));
        assert!(
            store
                .exists("other:products_list_c=Books;p=1")
                .await
                .expect("exists")
        );
        assert!(
            !store
                .exists("catalog:products_list_c=Books;p=2")
                .await
                .expect("exists")
        );
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let store = store(2);
        store.set("a", Bytes::from_static(b"1"), MINUTE).await.expect("set");
        store.set("b", Bytes::from_static(b"2"), MINUTE).await.expect("set");
        // touch `a` so `b` becomes the eviction candidate
        store.get("a").await.expect("get");
        store.set("c", Bytes::from_static(b"3"), MINUTE).await.expect("set");

        assert!(store.exists("a").await.expect("exists"));
        assert!(!store.exists("b").await.expect("exists"));
        assert!(store.exists("c").await.expect("exists"));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = store(2);
        store.remove("missing").await.expect("remove");
        store.set("a", Bytes::from_static(b"1"), MINUTE).await.expect("set");
        store.remove("a").await.expect("remove");
        store.remove("a").await.expect("remove");
        assert!(!store.exists("a").await.expect("exists"));
    }

    #[tokio::test]
    async fn generations_start_at_zero_and_count_up() {
        let store = store(2);
        assert_eq!(store.generation("gen").await.expect("generation"), 0);
        assert_eq!(store.bump_generation("gen").await.expect("bump"), 1);
        assert_eq!(store.bump_generation("gen").await.expect("bump"), 2);
        assert_eq!(store.generation("gen").await.expect("generation"), 2);
        assert_eq!(store.generation("other").await.expect("generation"), 0);
    }

    #[tokio::test]
    async fn conditional_set_skips_after_generation_moves() {
        let store = store(4);
        let seen = store.generation("gen").await.expect("generation");

        let stored = store
            .set_if_generation("a", Bytes::from_static(b"1"), MINUTE, "gen", seen)
            .await
            .expect("set");
        assert!(stored);

        store.bump_generation("gen").await.expect("bump");
        let stored = store
            .set_if_generation("b", Bytes::from_static(b"2"), MINUTE, "gen", seen)
            .await
            .expect("set");
        assert!(!stored);
        assert!(store.exists("a").await.expect("exists"));
        assert!(!store.exists("b").await.expect("exists"));
    }

    #[tokio::test]
    async fn generation_counters_survive_eviction() {
        let store = store(1);
        store.bump_generation("gen").await.expect("bump");
        store.set("a", Bytes::from_static(b"1"), MINUTE).await.expect("set");
        store.set("b", Bytes::from_static(b"2"), MINUTE).await.expect("set");

        assert_eq!(store.generation("gen").await.expect("generation"), 1);
        assert_eq!(store.len(), 1);
    }
}
