//! In-memory LRU tier.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::CacheKey;

/// Default maximum number of decoded assets kept in memory.
pub const DEFAULT_MEMORY_CAPACITY: usize = 100;

/// Count-bounded LRU map from key to decoded asset.
///
/// Entries may be evicted at any time to make room; the only explicit
/// invalidation is [`MemoryStore::clear`].
pub struct MemoryStore<V> {
    cache: Mutex<LruCache<CacheKey, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> MemoryStore<V> {
    /// Creates a new store with the specified capacity (at least one entry).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Gets an asset, promoting it in the LRU.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let value = self.cache.lock().get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
        }
        value
    }

    /// Peeks at an asset without promoting it or touching the counters.
    pub fn peek(&self, key: &CacheKey) -> Option<V> {
        self.cache.lock().peek(key).cloned()
    }

    /// Stores an asset, evicting the least recently used entry if full.
    pub fn set(&self, key: CacheKey, value: V) {
        trace!(key = %key, "Storing asset in memory cache");
        if let Some((evicted, _)) = self.cache.lock().push(key.clone(), value)
            && evicted != key
        {
            trace!(key = %evicted, "Evicted asset from memory cache");
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
        debug!("Cleared memory cache");
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns hit/miss statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl<V> std::fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (len, cap) = {
            let cache = self.cache.lock();
            (cache.len(), cache.cap())
        };
        f.debug_struct("MemoryStore")
            .field("len", &len)
            .field("cap", &cap)
            .finish_non_exhaustive()
    }
}

/// Statistics about memory tier performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached assets.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} in memory, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}
