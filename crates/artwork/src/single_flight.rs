//! Per-key mutual exclusion so one cache slot is never fetched twice at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

type Inflight = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

#[derive(Default)]
pub struct KeyLocks {
    inflight: Inflight,
}

/// Holds one key. Dropping the last holder or waiter forgets the key.
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    inflight: Inflight,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `key` is running, then holds it until
    /// the guard drops.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        // The map lock is never held across an await.
        let lock = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        KeyGuard {
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
            inflight: Arc::clone(&self.inflight),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release first so the guard's own reference is gone.
        drop(self.guard.take());
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if inflight
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyLocks::new());
        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let (locks, active, peak) = (locks.clone(), active.clone(), peak.clone());
            tasks.spawn(async move {
                let _guard = locks.acquire("steam:570").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while tasks.join_next().await.is_some() {}
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.acquire("steam:1").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("steam:2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let locks = Arc::new(KeyLocks::new());
        for id in 0..100 {
            let _guard = locks.acquire(&format!("steam:{id}")).await;
        }
        assert_eq!(locks.len(), 0);

        // A queued waiter keeps the key alive after the first holder leaves.
        let first = locks.acquire("steam:570").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("steam:570").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);
        assert!(locks.len() <= 1);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }
}
