use std::time::Duration;

use moka::future::{Cache, CacheBuilder};

use crate::traits::{SharedCacheStore, StorageError};

/// Bounded, TTL-expiring shared tier backed by moka.
#[derive(Debug, Clone)]
pub struct MokaSharedCache {
    cache: Cache<String, String>,
}

impl MokaSharedCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: CacheBuilder::new(max_capacity).time_to_live(ttl).build(),
        }
    }
}

impl SharedCacheStore for MokaSharedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }
}
