//! Observational counters of a [`BoundedCache`](crate::BoundedCache)
//!
//! Counters use relaxed atomics and never take part in eviction decisions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lookup, write and shrink counters
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removals: AtomicU64,
    shrinks: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a write, as a new key when `added` and as a replaced handle otherwise
    pub(crate) fn record_upsert(&self, added: bool) {
        let counter = if added { &self.inserts } else { &self.updates };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one shrink pass and the entries it dropped
    pub(crate) fn record_shrink(&self, evicted: usize) {
        self.shrinks.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Lookups that found their key
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that did not
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Writes that added a key
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Writes that replaced the handle of a key already cached
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Keys dropped by an explicit `remove`
    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    /// Shrink passes triggered by inserting into a full cache
    pub fn shrinks(&self) -> u64 {
        self.shrinks.load(Ordering::Relaxed)
    }

    /// Entries dropped by shrink passes
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Share of lookups that hit, 0.0 before the first lookup
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        match hits + self.misses() {
            0 => 0.0,
            lookups => hits as f64 / lookups as f64,
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.inserts,
            &self.updates,
            &self.removals,
            &self.shrinks,
            &self.evictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
