//! Per-key serialization of cache misses.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::entities::CacheKey;

/// Map of keys with a fetch in progress.
///
/// The first caller for a key gets the slot immediately; later callers wait
/// until it is released and are then expected to re-check the cache tiers
/// before fetching. Slots are removed once nobody holds or waits on them.
#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `key`.
    pub async fn acquire(&self, key: &CacheKey) -> FlightGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock();
            // A waiter cancelled after the holder released leaves its slot behind.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let guard = slot.lock_owned().await;
        FlightGuard {
            flights: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no key is held or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key; released on drop.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flights: &'a InFlight,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.flights.slots.lock();
        drop(self.guard.take());
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_removed_after_release() {
        let flights = InFlight::new();
        let key = CacheKey::derive("https://example.com/a.png");

        {
            let _guard = flights.acquire(&key).await;
            assert_eq!(flights.len(), 1);
        }

        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let flights = Arc::new(InFlight::new());
        let key = CacheKey::derive("https://example.com/a.png");
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = flights.clone();
            let key = key.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                let _guard = flights.acquire(&key).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_slot_is_reclaimed() {
        let flights = Arc::new(InFlight::new());
        let a = CacheKey::derive("https://example.com/a.png");
        let b = CacheKey::derive("https://example.com/b.png");

        let holder = flights.acquire(&a).await;
        let waiter = {
            let flights = flights.clone();
            let a = a.clone();
            tokio::spawn(async move {
                let _guard = flights.acquire(&a).await;
            })
        };
        tokio::task::yield_now().await;

        drop(holder);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        let _gb = flights.acquire(&b).await;
        assert_eq!(flights.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let flights = InFlight::new();
        let a = CacheKey::derive("https://example.com/a.png");
        let b = CacheKey::derive("https://example.com/b.png");

        let _ga = flights.acquire(&a).await;
        let gb = tokio::time::timeout(Duration::from_millis(100), flights.acquire(&b)).await;

        assert!(gb.is_ok());
        assert_eq!(flights.len(), 2);
    }
}
