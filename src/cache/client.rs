//! Typed, fail-open access to a [`CacheStore`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec;
use super::store::{CacheError, CacheStore};

/// The caller's cancellation signal fired before the cache work finished.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("operation canceled")]
pub struct Canceled;

/// Counter key used when the caller does not name one.
const DEFAULT_GENERATION_KEY: &str = "cache_generation";

/// Wraps a shared store with typed values and the fail-open policy.
///
/// Backend and codec failures are logged at `warn` and degrade to a miss (for
/// reads) or a no-op (for writes). Cancellation is the only condition that
/// reaches the caller.
///
/// Writes are fenced by a generation counter: a value is stored only if no
/// invalidation bumped the counter since the caller read it.
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn CacheStore>,
    generation_key: Arc<str>,
}

impl CacheClient {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            generation_key: Arc::from(DEFAULT_GENERATION_KEY),
        }
    }

    pub fn with_generation_key(mut self, key: impl Into<String>) -> Self {
        self.generation_key = Arc::from(key.into());
        self
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Canceled> {
        let started = Instant::now();
        let payload = match self.cancelable(cancel, self.store.get(key)).await {
            Ok(payload) => payload,
            Err(CacheError::Canceled) => return Err(Canceled),
            Err(err) => {
                self.degraded("get", key, &err);
                return Ok(None);
            }
        };

        let Some(payload) = payload else {
            debug!(
                key,
                backend = self.backend(),
                elapsed_ms = elapsed_ms(started),
                "Cache miss"
            );
            return Ok(None);
        };

        match codec::decode(&payload) {
            Ok(value) => {
                debug!(
                    key,
                    backend = self.backend(),
                    elapsed_ms = elapsed_ms(started),
                    "Cache hit"
                );
                Ok(Some(value))
            }
            Err(err) => {
                self.degraded("decode", key, &err);
                Ok(None)
            }
        }
    }

    /// Reads the invalidation generation. `None` means the backend failed and
    /// nothing loaded now may be stored.
    pub async fn generation(&self, cancel: &CancellationToken) -> Result<Option<u64>, Canceled> {
        let key = &*self.generation_key;
        match self.cancelable(cancel, self.store.generation(key)).await {
            Ok(generation) => Ok(Some(generation)),
            Err(CacheError::Canceled) => Err(Canceled),
            Err(err) => {
                self.degraded("generation", key, &err);
                Ok(None)
            }
        }
    }

    /// Advances the invalidation generation so loads that started earlier
    /// cannot store their results. Returns `false` when the backend failed.
    pub async fn bump_generation(&self) -> bool {
        let key = &*self.generation_key;
        match self.store.bump_generation(key).await {
            Ok(generation) => {
                debug!(key, backend = self.backend(), generation, "Cache generation bumped");
                true
            }
            Err(err) => {
                self.degraded("bump_generation", key, &err);
                false
            }
        }
    }

    /// Stores `value` if the generation still equals `generation` and `cancel`
    /// has not fired. Once issued, the write runs to completion so the backend
    /// never sees a half-applied command. Returns whether the value was stored.
    pub async fn set_if_generation<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<bool, Canceled> {
        let payload = match codec::encode(value) {
            Ok(payload) => payload,
            Err(err) => {
                self.degraded("encode", key, &err);
                return Ok(false);
            }
        };

        if cancel.is_cancelled() {
            return Err(Canceled);
        }

        let outcome = self
            .store
            .set_if_generation(key, payload, ttl, &self.generation_key, generation)
            .await;
        match outcome {
            Ok(true) => {
                debug!(
                    key,
                    backend = self.backend(),
                    ttl_secs = ttl.as_secs(),
                    "Cache set"
                );
                Ok(true)
            }
            Ok(false) => {
                debug!(
                    key,
                    backend = self.backend(),
                    generation,
                    "Cache set skipped, entry invalidated while loading"
                );
                Ok(false)
            }
            Err(err) => {
                self.degraded("set", key, &err);
                Ok(false)
            }
        }
    }

    pub async fn exists(&self, key: &str, cancel: &CancellationToken) -> Result<bool, Canceled> {
        match self.cancelable(cancel, self.store.exists(key)).await {
            Ok(found) => Ok(found),
            Err(CacheError::Canceled) => Err(Canceled),
            Err(err) => {
                self.degraded("exists", key, &err);
                Ok(false)
            }
        }
    }

    /// Removes one key. Returns `false` when the backend failed.
    pub async fn remove(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(()) => {
                debug!(key, backend = self.backend(), "Cache remove");
                true
            }
            Err(err) => {
                self.degraded("remove", key, &err);
                false
            }
        }
    }

    /// Removes every key under `prefix`. Returns `None` when the backend failed.
    pub async fn remove_prefix(&self, prefix: &str) -> Option<u64> {
        match self.store.remove_prefix(prefix).await {
            Ok(removed) => {
                debug!(
                    key = prefix,
                    backend = self.backend(),
                    removed,
                    "Cache remove by prefix"
                );
                Some(removed)
            }
            Err(err) => {
                self.degraded("remove_prefix", prefix, &err);
                None
            }
        }
    }

    async fn cancelable<T>(
        &self,
        cancel: &CancellationToken,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CacheError::Canceled),
            result = op => result,
        }
    }

    fn degraded(&self, op: &'static str, key: &str, err: &CacheError) {
        warn!(
            op,
            key,
            backend = self.backend(),
            error = %err,
            "Cache unavailable, continuing without it"
        );
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
