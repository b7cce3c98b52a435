//! Post-write cache invalidation.

use tracing::{debug, warn};
use uuid::Uuid;

use super::client::CacheClient;
use super::keys::CacheKeys;

/// Removes cached views that a committed product write may have made stale.
///
/// Runs after the transaction commits and before the write returns. Failures
/// are logged and swallowed: the write already happened, and TTL expiry bounds
/// how long a missed entry can linger.
#[derive(Clone)]
pub struct CacheInvalidator {
    client: CacheClient,
    keys: CacheKeys,
}

impl CacheInvalidator {
    pub fn new(client: CacheClient, keys: CacheKeys) -> Self {
        Self { client, keys }
    }

    /// Drops the product's point entry and every cached list page.
    ///
    /// The generation is bumped first, so loads already in flight cannot
    /// write their pre-change results back afterwards.
    pub async fn product_changed(&self, id: Uuid) {
        let point_key = self.keys.product(id);
        let list_prefix = self.keys.product_list_prefix();

        let fenced = self.client.bump_generation().await;
        let point_removed = self.client.remove(&point_key).await;
        let lists_removed = self.client.remove_prefix(&list_prefix).await;

        match (fenced, point_removed, lists_removed) {
            (true, true, Some(pages)) => debug!(
                product_id = %id,
                list_pages = pages,
                "Invalidated product cache entries"
            ),
            _ => warn!(
                product_id = %id,
                fenced,
                point_removed,
                lists_removed = lists_removed.is_some(),
                "Cache invalidation incomplete, stale entries expire with their TTL"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::application::pagination::PageRequest;
    use crate::application::repos::ProductQueryFilter;
    use crate::cache::store::{CacheStore, LocalStore};

    #[tokio::test]
    async fn removes_point_key_and_all_list_pages() {
        let store = Arc::new(LocalStore::new(NonZeroUsize::new(32).expect("non-zero")));
        let keys = CacheKeys::new("catalog:");
        let client = CacheClient::new(store.clone()).with_generation_key(keys.generation());
        let invalidator = CacheInvalidator::new(client, keys.clone());

        let target = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        let ttl = Duration::from_secs(60);
        let electronics = ProductQueryFilter {
            category: Some("Electronics".to_string()),
            ..Default::default()
        };
        let list_keys = [
            keys.product_list(&electronics, PageRequest::new(1, 10).expect("page")),
            keys.product_list(&electronics, PageRequest::new(2, 10).expect("page")),
            keys.product_list(&ProductQueryFilter::default(), PageRequest::default()),
        ];

        for key in list_keys
            .iter()
            .cloned()
            .chain([keys.product(target), keys.product(bystander)])
        {
            store
                .set(&key, Bytes::from_static(b"{}"), ttl)
                .await
                .expect("seed");
        }

        invalidator.product_changed(target).await;

        assert_eq!(
            store.generation(&keys.generation()).await.expect("generation"),
            1
        );
        assert!(!store.exists(&keys.product(target)).await.expect("exists"));
        assert!(store.exists(&keys.product(bystander)).await.expect("exists"));
        for key in &list_keys {
            assert!(!store.exists(key).await.expect("exists"), "{key} survived");
        }
    }
}
