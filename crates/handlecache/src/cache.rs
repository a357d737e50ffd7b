//! BoundedCache: thread-safe LRU cache of shared handles

use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::debug;

use crate::config::CacheBounds;
use crate::index::Index;
use crate::stats::CacheStats;

/// Keyed cache of `Arc<V>` handles with least-recently-used eviction
///
/// Values are handed out as shared handles: evicting or removing an entry only
/// drops the cache's reference, so callers holding a handle keep the value alive.
pub struct BoundedCache<V> {
    /// Primary and recency indices, guarded together
    index: RwLock<Index<V>>,

    /// Eviction thresholds
    bounds: RwLock<CacheBounds>,

    /// Cache statistics
    stats: CacheStats,
}

impl<V> BoundedCache<V> {
    /// Create a cache with the default bounds (max 100, low-water-mark 80)
    pub fn new() -> Self {
        Self::with_bounds(CacheBounds::default())
    }

    /// Create a cache with the given bounds
    pub fn with_bounds(bounds: CacheBounds) -> Self {
        Self {
            index: RwLock::new(Index::new()),
            bounds: RwLock::new(bounds),
            stats: CacheStats::new(),
        }
    }

    /// Look up `key`, marking it as most recently used on a hit
    ///
    /// # Arguments
    /// * `key` - Cache key
    ///
    /// # Returns
    /// * `Option<Arc<V>>` - Shared handle, or `None` on a miss
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let index = self.index.upgradable_read();
        if index.lookup(key).is_none() {
            self.stats.record_miss();
            return None;
        }

        let mut index = RwLockUpgradableReadGuard::upgrade(index);
        let value = index.touch(key);
        self.stats.record_hit();
        value
    }

    /// Insert `value` under `key`, replacing any previous handle
    ///
    /// Adding a new key to a cache that already holds `max_items` entries first
    /// evicts least recently used entries down to the low-water-mark.
    pub fn insert(&self, key: &str, value: V) {
        self.insert_arc(key, Arc::new(value));
    }

    /// Insert an already shared handle under `key`
    pub fn insert_arc(&self, key: &str, value: Arc<V>) {
        let bounds = self.bounds();
        let mut index = self.index.write();
        self.make_room(&mut index, key, bounds);
        let added = index.upsert(key, value);
        self.stats.record_upsert(added);
    }

    /// Return the cached handle for `key`, constructing and inserting it on a miss
    ///
    /// `init` runs without the cache lock held. If another thread inserts the same
    /// key in the meantime, its handle wins and the freshly built value is dropped.
    pub fn get_or_insert_with<F>(&self, key: &str, init: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        self.insert_if_absent(key, Arc::new(init()))
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with)
    ///
    /// Errors are returned to the caller and nothing is cached for `key`.
    pub fn get_or_try_insert_with<F, E>(&self, key: &str, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = Arc::new(init()?);
        Ok(self.insert_if_absent(key, value))
    }

    fn insert_if_absent(&self, key: &str, value: Arc<V>) -> Arc<V> {
        let bounds = self.bounds();
        let mut index = self.index.write();
        if let Some(existing) = index.touch(key) {
            return existing;
        }
        self.make_room(&mut index, key, bounds);
        let added = index.upsert(key, Arc::clone(&value));
        self.stats.record_upsert(added);
        value
    }

    /// Shrink before a new key is added to a full cache
    fn make_room(&self, index: &mut Index<V>, key: &str, bounds: CacheBounds) {
        if index.lookup(key).is_some() || index.len() < bounds.max_items as usize {
            return;
        }

        let target = if bounds.caching_disabled() {
            0
        } else {
            bounds.low_water_mark()
        };
        let before = index.len();
        let evicted = index.shrink_to(target);
        self.stats.record_shrink(evicted);
        debug!(before, evicted, target, "cache shrink");
    }

    /// Remove `key` from the cache
    ///
    /// # Returns
    /// * `Option<Arc<V>>` - The released handle, if the key was cached
    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        let removed = self.index.write().remove(key);
        if removed.is_some() {
            self.stats.record_removal();
        }
        removed
    }

    /// Drop every entry, restart recency ids and reset statistics
    ///
    /// Handles already held by callers stay valid.
    pub fn reset(&self) {
        self.index.write().clear();
        self.stats.reset();
    }

    /// Presence check that leaves recency untouched
    pub fn contains(&self, key: &str) -> bool {
        self.index.read().lookup(key).is_some()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys, least recently used first
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.index.read().keys_by_recency()
    }

    /// Replace both thresholds. Takes effect on the next insert.
    pub fn set_bounds(&self, min_items: u32, max_items: u32) {
        self.set_bounds_config(CacheBounds::new(min_items, max_items));
    }

    /// Replace the bounds configuration
    pub fn set_bounds_config(&self, bounds: CacheBounds) {
        *self.bounds.write() = bounds;
    }

    /// Current bounds configuration
    pub fn bounds(&self) -> CacheBounds {
        *self.bounds.read()
    }

    /// Size at which inserts start evicting
    pub fn get_max_items(&self) -> u32 {
        self.bounds.read().max_items
    }

    /// Low-water-mark
    pub fn get_min_items(&self) -> u32 {
        self.bounds.read().min_items
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<V> Default for BoundedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
