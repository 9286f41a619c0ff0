use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutexes for single-flight sections.
///
/// Concurrent requests for the same key serialize; the first does the work
/// and the rest observe its result. Acquisition is bounded so a stampede on
/// a slow transform degrades into fast rejections rather than a pile-up of
/// parked requests.
pub struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// The key's lock could not be acquired within the deadline.
#[derive(Debug)]
pub struct AcquireTimeout;

pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub async fn acquire(&self, key: K, timeout: Duration) -> Result<KeyGuard, AcquireTimeout> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard { _guard: guard }),
            Err(_) => Err(AcquireTimeout),
        }
    }

    /// Drop the entry for a key nobody is holding or waiting on. Call after
    /// finishing work on the key to keep the map from growing with every
    /// key ever seen.
    pub fn release(&self, key: &K) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let concurrent = concurrent.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks
                    .acquire("key".to_string(), Duration::from_secs(5))
                    .await
                    .unwrap();
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let _a = locks
            .acquire("a".to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        locks
            .acquire("b".to_string(), Duration::from_millis(50))
            .await
            .expect("unrelated key should acquire immediately");
    }

    #[tokio::test]
    async fn held_lock_times_out_waiters() {
        let locks = KeyedLocks::new();
        let _held = locks
            .acquire("key".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        let result = locks
            .acquire("key".to_string(), Duration::from_millis(20))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn release_evicts_idle_entries() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks
                .acquire("key".to_string(), Duration::from_secs(1))
                .await
                .unwrap();
            // Held: release must keep the entry.
            locks.release(&"key".to_string());
            assert_eq!(locks.len(), 1);
        }
        locks.release(&"key".to_string());
        assert_eq!(locks.len(), 0);
    }
}
