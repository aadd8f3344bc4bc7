// Per-queue critical sections

use crate::domain::QueueName;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per queue name.
///
/// Entries are created on first use and removed once nobody holds or waits
/// on them, so the map only ever contains queues with in-flight operations.
#[derive(Default)]
pub struct QueueLocks {
    locks: Mutex<HashMap<QueueName, Arc<AsyncMutex<()>>>>,
}

impl QueueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `queue_name`
    pub async fn acquire(&self, queue_name: &QueueName) -> QueueGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(queue_name.clone()).or_default())
        };

        // Built before waiting so a cancelled waiter still runs the cleanup.
        // The pending lock future is dropped before this guard on cancel.
        let mut queue_guard = QueueGuard {
            registry: self,
            queue_name: queue_name.clone(),
            guard: None,
        };
        queue_guard.guard = Some(lock.lock_owned().await);
        queue_guard
    }

    /// Queues with an operation currently holding or awaiting the lock
    pub fn active(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Held for the duration of one join/leave.
///
/// `guard` is `None` while still waiting for the lock.
pub struct QueueGuard<'a> {
    registry: &'a QueueLocks,
    queue_name: QueueName,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the map + waiters
        self.guard.take();

        let mut locks = self
            .registry
            .locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(&self.queue_name) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.queue_name);
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
    async fn test_registry_empties_after_release() {
        let locks = QueueLocks::new();
        let sales = QueueName::parse("Sales").unwrap();

        {
            let _guard = locks.acquire(&sales).await;
            assert_eq!(locks.active(), 1);
        }

        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_queue_is_exclusive() {
        let locks = Arc::new(QueueLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let queue = QueueName::parse("Sales").unwrap();
                let _guard = locks.acquire(&queue).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_queues_do_not_block() {
        let locks = QueueLocks::new();
        let sales = QueueName::parse("Sales").unwrap();
        let support = QueueName::parse("Support").unwrap();

        let _sales_guard = locks.acquire(&sales).await;
        let support_guard = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&support))
            .await
            .expect("other queue must not wait");
        assert_eq!(locks.active(), 2);
        drop(support_guard);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = Arc::new(QueueLocks::new());
        let sales = QueueName::parse("Sales").unwrap();

        let holder = locks.acquire(&sales).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let sales = sales.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&sales).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // Release first, then cancel the waiter before it wakes up
        drop(holder);
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_waiter_cancelled_while_lock_held() {
        let locks = Arc::new(QueueLocks::new());
        let sales = QueueName::parse("Sales").unwrap();

        let holder = locks.acquire(&sales).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let sales = sales.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&sales).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(locks.active(), 1);

        drop(holder);
        assert_eq!(locks.active(), 0);

        // Lock still usable afterwards
        let again = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&sales))
            .await
            .expect("lock must be free");
        drop(again);
        assert_eq!(locks.active(), 0);
    }
}
