//! Request-coalescing async cache
//!
//! Concurrent requests for the same missing key share one load. A failed
//! load removes its entry so the next request starts a fresh attempt.

use crate::error::{PkgriskError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Slot<V> = Arc<OnceCell<Arc<V>>>;

enum Attempt {
    /// The slot left the map before this caller got to load it
    Detached,
    Failed(PkgriskError),
}

pub struct CoalescingCache<V> {
    name: &'static str,
    entries: Mutex<HashMap<String, Slot<V>>>,
}

impl<V> CoalescingCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value for `key`, loading it at most once across concurrent callers
    pub async fn get_or_try_load<F, Fut>(&self, key: &str, load: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let mut load = Some(load);
        loop {
            let slot = self.slot(key).await;
            if let Some(value) = slot.get() {
                tracing::debug!("{} cache hit: {}", self.name, key);
                return Ok(value.clone());
            }

            let result = slot
                .get_or_try_init(|| async {
                    // A waiter on a slot evicted by a failed load rejoins the live slot
                    if !self.is_current(key, &slot).await {
                        return Err(Attempt::Detached);
                    }
                    let Some(load) = load.take() else {
                        return Err(Attempt::Detached);
                    };
                    tracing::debug!("{} cache miss, loading: {}", self.name, key);
                    match load().await {
                        Ok(value) => Ok(Arc::new(value)),
                        Err(e) => {
                            // Evict before the cell is released to the next waiter
                            self.remove_slot(key, &slot).await;
                            Err(Attempt::Failed(e))
                        }
                    }
                })
                .await;

            match result {
                Ok(value) => return Ok(value.clone()),
                Err(Attempt::Detached) if load.is_some() => {
                    tracing::debug!("{} cache slot for {} was evicted, retrying", self.name, key);
                }
                Err(Attempt::Detached) => {
                    return Err(anyhow::anyhow!(
                        "{} cache loader for {} already consumed",
                        self.name,
                        key
                    )
                    .into());
                }
                Err(Attempt::Failed(e)) => {
                    tracing::warn!("{} load failed for {}, entry evicted: {}", self.name, key, e);
                    return Err(e);
                }
            }
        }
    }

    async fn slot(&self, key: &str) -> Slot<V> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn is_current(&self, key: &str, slot: &Slot<V>) -> bool {
        self.entries
            .lock()
            .await
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Remove the entry only if it is still the slot that failed
    async fn remove_slot(&self, key: &str, slot: &Slot<V>) {
        let mut entries = self.entries.lock().await;
        if entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            entries.remove(key);
        }
    }

    pub async fn evict(&self, key: &str) -> bool {
        let removed = self.entries.lock().await.remove(key).is_some();
        if removed {
            tracing::debug!("{} cache evicted: {}", self.name, key);
        }
        removed
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        tracing::debug!("{} cache cleared ({} entries)", self.name, entries.len());
        entries.clear();
    }

    /// Number of loaded entries
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn transient() -> PkgriskError {
        PkgriskError::io(
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
            "fetch",
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loads_coalesce() {
        let cache = Arc::new(CoalescingCache::<String>::new("test"));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_load("chunk_052", || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("payload".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(*handle.await.unwrap().unwrap(), "payload");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let cache = CoalescingCache::<u32>::new("test");

        let first = cache.get_or_try_load("k", || async { Err(transient()) }).await;
        assert!(first.is_err());
        assert!(cache.is_empty().await);

        let second = cache.get_or_try_load("k", || async { Ok(7) }).await.unwrap();
        assert_eq!(*second, 7);
    }

    #[tokio::test]
    async fn test_evict_and_clear() {
        let cache = CoalescingCache::<u32>::new("test");
        cache.get_or_try_load("a", || async { Ok(1) }).await.unwrap();
        cache.get_or_try_load("b", || async { Ok(2) }).await.unwrap();
        assert_eq!(cache.len().await, 2);

        assert!(cache.evict("a").await);
        assert!(!cache.evict("a").await);
        let reloaded = cache.get_or_try_load("a", || async { Ok(10) }).await.unwrap();
        assert_eq!(*reloaded, 10);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_on_failed_slot_share_the_retry() {
        let cache = Arc::new(CoalescingCache::<u32>::new("test"));
        let loads = Arc::new(AtomicUsize::new(0));

        // First load fails after 50ms, every later load succeeds after 100ms
        let spawn_at = |delay_ms: u64| {
            let cache = cache.clone();
            let loads = loads.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                cache
                    .get_or_try_load("k", || async move {
                        if loads.fetch_add(1, Ordering::SeqCst) == 0 {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err(transient())
                        } else {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(42)
                        }
                    })
                    .await
            })
        };

        let failing = spawn_at(0);
        let waiters = vec![spawn_at(10), spawn_at(10), spawn_at(75)];

        assert!(failing.await.unwrap().is_err());
        for waiter in waiters {
            assert_eq!(*waiter.await.unwrap().unwrap(), 42);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 1);
    }
}
