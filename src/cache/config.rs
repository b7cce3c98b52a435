//! Cache configuration.
//!
//! Resolved once from `[cache]` in the settings file and never re-read.

use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_KEY_PREFIX: &str = "catalog:";
const DEFAULT_PRODUCT_TTL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_LIST_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_LOCAL_CAPACITY: usize = 10_000;
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Networked backend address. `None` selects the in-process store.
    pub redis_url: Option<String>,
    /// Namespace prepended to every key.
    pub key_prefix: String,
    /// TTL for single-product lookups.
    pub product_ttl: Duration,
    /// TTL for list pages; shorter because any write touches them.
    pub list_ttl: Duration,
    /// Maximum entries held by the in-process store.
    pub local_capacity: NonZeroUsize,
    /// Upper bound on each networked cache round-trip.
    pub operation_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            product_ttl: DEFAULT_PRODUCT_TTL,
            list_ttl: DEFAULT_LIST_TTL,
            local_capacity: NonZeroUsize::new(DEFAULT_LOCAL_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            redis_url: settings.redis_url.clone(),
            key_prefix: settings.key_prefix.clone(),
            product_ttl: settings.product_ttl,
            list_ttl: settings.list_ttl,
            local_capacity: settings.local_capacity,
            operation_timeout: settings.operation_timeout,
        }
    }
}

impl CacheConfig {
    /// The configured Redis address, ignoring blank values.
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.redis_url, None);
        assert_eq!(config.key_prefix, "catalog:");
        assert_eq!(config.product_ttl, Duration::from_secs(600));
        assert_eq!(config.list_ttl, Duration::from_secs(300));
        assert_eq!(config.local_capacity.get(), 10_000);
        assert!(config.list_ttl < config.product_ttl);
    }

    #[test]
    fn blank_redis_url_means_local() {
        let config = CacheConfig {
            redis_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.redis_url(), None);

        let config = CacheConfig {
            redis_url: Some("redis://cache:6379".to_string()),
            ..Default::default()
        };
        assert_eq!(config.redis_url(), Some("redis://cache:6379"));
    }
}
