//! # handlecache
//!
//! Bounded, thread-safe LRU cache of shared handles to expensive objects
//! (parsed format state, opened handlers).
//!
//! ## Architecture
//! - **Primary index**: AHash map from key to recency id and `Arc<V>` handle
//! - **Recency index**: `BTreeMap` ordered by a monotonic id, first entry is the LRU
//! - **Locking**: one `parking_lot::RwLock` around both indices, so they never diverge
//! - **Eviction**: adding a key to a full cache shrinks it to a low-water-mark
//!
//! ```
//! use handlecache::{BoundedCache, CacheBounds};
//!
//! let cache = BoundedCache::with_bounds(CacheBounds::new(1, 3));
//! for key in ["a", "b", "c"] {
//!     cache.insert(key, key.len());
//! }
//! cache.get("a");
//! cache.insert("d", 1);
//!
//! assert_eq!(cache.keys_by_recency(), vec!["a", "d"]);
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod index;
mod stats;

pub use cache::BoundedCache;
pub use config::{CacheBounds, DEFAULT_MAX_ITEMS, DEFAULT_MIN_ITEMS};
pub use stats::CacheStats;
