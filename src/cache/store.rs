//! In-memory cache backend.
//!
//! Holds rendered values in a bounded LRU, suitable for a single process or
//! for tests. Distributed backends implement [`CacheClient`] the same way.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;

use crate::application::render::RenderedValue;

use super::client::{CacheClient, CacheError};
use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_STORE_EVICT_TOTAL: &str = "platter_store_evict_total";

/// Bounded LRU store of rendered values.
pub struct MemoryCache {
    entries: RwLock<LruCache<CacheKey, RenderedValue>>,
}

impl MemoryCache {
    /// Create a new store sized from the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<RenderedValue> {
        rw_write(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Insert one entry, returning the key evicted to make room, if any.
    pub fn set(&self, key: CacheKey, value: RenderedValue) -> Option<CacheKey> {
        let evicted = rw_write(&self.entries, SOURCE, "set")
            .push(key.clone(), value)
            .and_then(|(evicted_key, _)| (evicted_key != key).then_some(evicted_key));
        if evicted.is_some() {
            counter!(METRIC_STORE_EVICT_TOTAL).increment(1);
        }
        evicted
    }

    pub fn invalidate(&self, key: &CacheKey) {
        rw_write(&self.entries, SOURCE, "invalidate").pop(key);
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn read_multi(
        &self,
        keys: &[CacheKey],
    ) -> Result<HashMap<CacheKey, RenderedValue>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "read_multi");
        let mut hits = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = entries.get(key) {
                hits.insert(key.clone(), value.clone());
            }
        }
        Ok(hits)
    }

    async fn write_multi(&self, entries: &[(CacheKey, RenderedValue)]) -> Result<(), CacheError> {
        let mut store = rw_write(&self.entries, SOURCE, "write_multi");
        let mut evictions = 0u64;
        for (key, value) in entries {
            let replaced = store.push(key.clone(), value.clone());
            if replaced.is_some_and(|(evicted, _)| &evicted != key) {
                evictions += 1;
            }
        }
        drop(store);
        if evictions > 0 {
            counter!(METRIC_STORE_EVICT_TOTAL).increment(evictions);
        }
        Ok(())
    }
}
