//! Size thresholds for [`BoundedCache`](crate::BoundedCache)

/// Default maximum number of cached items
pub const DEFAULT_MAX_ITEMS: u32 = 100;

/// Default low-water-mark
pub const DEFAULT_MIN_ITEMS: u32 = 80;

/// Capacity thresholds of a bounded cache
///
/// Once the cache holds `max_items` entries, adding a new key first evicts
/// least recently used entries until at most `min_items` remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBounds {
    /// Low-water-mark the cache shrinks down to
    pub min_items: u32,
    /// Size at which an insert triggers eviction
    pub max_items: u32,
}

impl CacheBounds {
    /// Explicit thresholds, stored as given
    pub fn new(min_items: u32, max_items: u32) -> Self {
        Self {
            min_items,
            max_items,
        }
    }

    /// Thresholds with the low-water-mark derived as 80% of `max_items`
    pub fn with_max_items(max_items: u32) -> Self {
        let min_items = (u64::from(max_items) * 4 / 5) as u32;
        Self {
            min_items,
            max_items,
        }
    }

    /// `min_items < 1` means every overflow empties the cache
    pub fn caching_disabled(&self) -> bool {
        self.min_items < 1
    }

    /// Size a shrink pass targets.
    ///
    /// Always strictly below `max_items`, so a misconfigured `min_items >= max_items`
    /// cannot push the cache past its maximum.
    pub fn low_water_mark(&self) -> usize {
        self.min_items.min(self.max_items.saturating_sub(1)) as usize
    }
}

impl Default for CacheBounds {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ITEMS, DEFAULT_MAX_ITEMS)
    }
}
