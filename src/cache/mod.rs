//! Catalog cache layer.
//!
//! A read-through cache in front of the relational store:
//!
//! - [`CacheStore`] is the raw key/value contract, implemented by
//!   [`LocalStore`] (in-process LRU) and [`RedisStore`] (networked).
//! - [`CacheClient`] adds typed JSON payloads, the fail-open policy and
//!   [`CacheClient::get_or_load`].
//! - [`CacheKeys`] names every entry; [`CacheInvalidator`] drops the ones a
//!   write made stale.
//!
//! Every invalidation bumps a generation counter before it removes keys, and
//! a load only stores its result if the counter did not move while it ran.
//! This keeps a slow read from writing a pre-change value back after the
//! change was invalidated.
//!
//! Concurrent misses on one key each hit the database and repopulate the
//! entry independently. Coalescing in-flight loads per key would remove the
//! duplicated work if read volume ever calls for it.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! redis_url = "redis://127.0.0.1:6379"  # omit for the in-process store
//! key_prefix = "catalog:"
//! product_ttl_seconds = 600
//! list_ttl_seconds = 300
//! ```

mod client;
mod codec;
mod config;
mod invalidation;
mod keys;
mod lock;
mod read_through;
mod redis_store;
mod store;

use std::sync::Arc;

use tracing::info;

pub use client::{CacheClient, Canceled};
pub use codec::{decode, encode};
pub use config::{CacheConfig, DEFAULT_KEY_PREFIX};
pub use invalidation::CacheInvalidator;
pub use keys::CacheKeys;
pub use read_through::Cacheable;
pub use redis_store::RedisStore;
pub use store::{CacheError, CacheStore, LocalStore};

/// Builds the process-wide store. Redis is chosen when an address is
/// configured; otherwise entries live in process memory.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.redis_url() {
        Some(url) => {
            let store = RedisStore::new(url, config.operation_timeout)?;
            info!(
                backend = store.backend(),
                timeout_ms = config.operation_timeout.as_millis() as u64,
                "Cache store selected"
            );
            Ok(Arc::new(store))
        }
        None => {
            let store = LocalStore::new(config.local_capacity);
            info!(
                backend = store.backend(),
                capacity = config.local_capacity.get(),
                "Cache store selected"
            );
            Ok(Arc::new(store))
        }
    }
}
