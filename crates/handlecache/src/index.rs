//! Key and recency indices of the cache
//!
//! Recency ids come from a monotonic counter, so ascending order of the
//! recency index is LRU order: the first entry is the least recently used.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ahash::RandomState;
use tracing::warn;

/// Primary index entry
struct Slot<V> {
    recency_id: u64,
    value: Arc<V>,
}

/// Both indices plus the id counter, always mutated together
pub(crate) struct Index<V> {
    primary: HashMap<Arc<str>, Slot<V>, RandomState>,
    recency: BTreeMap<u64, Arc<str>>,
    next_id: u64,
}

impl<V> Index<V> {
    pub(crate) fn new() -> Self {
        Self {
            primary: HashMap::with_hasher(RandomState::new()),
            recency: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.primary.len()
    }

    /// Handle stored under `key`, leaving recency untouched
    pub(crate) fn lookup(&self, key: &str) -> Option<&Arc<V>> {
        self.primary.get(key).map(|slot| &slot.value)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Refresh the recency of `key` and return its handle
    pub(crate) fn touch(&mut self, key: &str) -> Option<Arc<V>> {
        let (shared_key, slot) = self.primary.get_key_value(key)?;
        let shared_key = Arc::clone(shared_key);
        let old_id = slot.recency_id;
        let value = Arc::clone(&slot.value);

        let id = self.allocate_id();
        self.recency.remove(&old_id);
        self.recency.insert(id, shared_key);
        if let Some(slot) = self.primary.get_mut(key) {
            slot.recency_id = id;
        }
        Some(value)
    }

    /// Insert or replace the handle under `key`, making it the most recent.
    ///
    /// Returns `true` when the key was not present before.
    pub(crate) fn upsert(&mut self, key: &str, value: Arc<V>) -> bool {
        if let Some(slot) = self.primary.get_mut(key) {
            slot.value = value;
            self.touch(key);
            return false;
        }

        let id = self.allocate_id();
        let shared_key: Arc<str> = Arc::from(key);
        self.recency.insert(id, Arc::clone(&shared_key));
        self.primary.insert(
            shared_key,
            Slot {
                recency_id: id,
                value,
            },
        );
        true
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Arc<V>> {
        let slot = self.primary.remove(key)?;
        self.recency.remove(&slot.recency_id);
        Some(slot.value)
    }

    /// Evict least recently used entries until at most `target` remain.
    ///
    /// Returns the number of entries evicted.
    pub(crate) fn shrink_to(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        while self.primary.len() > target {
            let before = self.primary.len();
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };
            self.primary.remove(&key);

            if self.primary.len() >= before {
                warn!(
                    key = %key,
                    size = before,
                    "recency index out of step with primary index, aborting shrink"
                );
                break;
            }
            evicted += 1;
        }
        evicted
    }

    /// Drop every entry and restart the id counter
    pub(crate) fn clear(&mut self) {
        self.primary.clear();
        self.recency.clear();
        self.next_id = 0;
    }

    /// Keys from least to most recently used
    pub(crate) fn keys_by_recency(&self) -> Vec<String> {
        self.recency.values().map(|key| key.to_string()).collect()
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.primary.len() == self.recency.len()
            && self.primary.iter().all(|(key, slot)| {
                self.recency
                    .get(&slot.recency_id)
                    .is_some_and(|k| **k == **key)
            })
    }
}
