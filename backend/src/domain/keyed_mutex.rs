//! In-process mutual exclusion keyed by string.
//!
//! Serializes concurrent purchase attempts that share an idempotency key so
//! at most one performs the registrar call on this instance. Waiters on one
//! key queue FIFO (tokio's mutex is fair); different keys never contend.
//!
//! This is a latency optimisation for the duplicate-within-one-instance
//! case. Cross-instance safety rests on the durable idempotency ledger and
//! the unique constraint on purchase order ids.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Map of key → refcounted async mutex. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct KeyedMutex {
    entries: Arc<Registry>,
}

impl KeyedMutex {
    /// Create an empty mutex map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting FIFO behind earlier holders.
    ///
    /// The returned guard releases the lock on drop; the last guard out
    /// removes the key's entry from the map.
    pub async fn acquire(&self, key: &str) -> KeyedMutexGuard {
        let entry = {
            let mut map = self
                .entries
                .lock()
                .expect("keyed mutex registry poisoned");
            Arc::clone(map.entry(key.to_owned()).or_default())
        };
        // The registry lock is released before awaiting so other keys can
        // proceed while this one queues.
        let permit = entry.lock_owned().await;
        KeyedMutexGuard {
            key: key.to_owned(),
            entries: Arc::clone(&self.entries),
            permit: Some(permit),
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.entries
            .lock()
            .expect("keyed mutex registry poisoned")
            .len()
    }
}

/// RAII guard over one key. Dropping releases the lock and garbage-collects
/// the map entry once no holder or waiter references it.
pub struct KeyedMutexGuard {
    key: String,
    entries: Arc<Registry>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedMutexGuard {
    fn drop(&mut self) {
        // Release the lock before inspecting the registry so a queued waiter
        // holding its own Arc keeps the entry alive.
        self.permit.take();
        let mut map = self
            .entries
            .lock()
            .expect("keyed mutex registry poisoned");
        if let Some(entry) = map.get(&self.key) {
            if Arc::strong_count(entry) == 1 {
                map.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes_critical_sections() {
        let mutex = KeyedMutex::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mutex = mutex.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = mutex.acquire("buy:example.com:k").await;
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task completes");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1, "sections must not overlap");
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let mutex = KeyedMutex::new();
        let _first = mutex.acquire("buy:a-site.com:k").await;

        // Must complete immediately despite the held sibling key.
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            mutex.acquire("buy:b-site.com:k"),
        )
        .await;
        assert!(second.is_ok(), "unrelated key should be acquirable");
    }

    #[tokio::test]
    async fn entries_are_removed_when_the_last_guard_drops() {
        let mutex = KeyedMutex::new();
        {
            let _guard = mutex.acquire("buy:example.com:k").await;
            assert_eq!(mutex.tracked_keys(), 1);
        }
        assert_eq!(mutex.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn reacquiring_after_release_succeeds() {
        let mutex = KeyedMutex::new();
        drop(mutex.acquire("buy:example.com:k").await);
        let reacquired = tokio::time::timeout(
            Duration::from_millis(100),
            mutex.acquire("buy:example.com:k"),
        )
        .await;
        assert!(reacquired.is_ok());
    }
}
