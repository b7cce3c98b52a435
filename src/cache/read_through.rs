//! Get-or-load wrapper over [`CacheClient`].

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::client::{CacheClient, Canceled};
use crate::application::pagination::PaginatedResult;

/// Decides whether a loaded value should populate the cache.
///
/// Empty results are never stored, so a miss always re-reads the source.
pub trait Cacheable {
    fn worth_caching(&self) -> bool;
}

impl<T> Cacheable for Option<T> {
    fn worth_caching(&self) -> bool {
        self.is_some()
    }
}

impl<T> Cacheable for PaginatedResult<T> {
    fn worth_caching(&self) -> bool {
        !self.items.is_empty()
    }
}

impl CacheClient {
    /// Returns the cached value for `key`, or runs `loader`, stores a
    /// non-empty result under `key` for `ttl`, and returns it.
    ///
    /// Loader errors pass through untouched and are never cached. When
    /// `cancel` fires, the call resolves to `Canceled` and no entry is written.
    /// The result is not stored if an invalidation ran while it was loading,
    /// or if the generation could not be read.
    pub async fn get_or_load<V, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        loader: F,
    ) -> Result<V, E>
    where
        V: Serialize + DeserializeOwned + Cacheable,
        E: From<Canceled>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get::<V>(key, cancel).await? {
            return Ok(hit);
        }

        let generation = self.generation(cancel).await?;
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Canceled.into()),
            loaded = loader() => loaded?,
        };

        if let Some(generation) = generation.filter(|_| value.worth_caching()) {
            self.set_if_generation(key, &value, ttl, generation, cancel)
                .await?;
        }
        Ok(value)
    }
}
