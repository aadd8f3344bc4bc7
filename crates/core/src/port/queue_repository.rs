// Queue Repository Port (Interface)

use crate::domain::{AggregationSnapshot, PhoneNumber, QueueEntry, QueueName};
use crate::error::Result;
use async_trait::async_trait;

/// Read side of the record store
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Entry counts grouped by queue name.
    ///
    /// Empty `tracked` reports every queue that currently has entries.
    /// Otherwise exactly the tracked queues are reported, zero-filled.
    async fn count_by_queue(&self, tracked: &[QueueName]) -> Result<AggregationSnapshot>;

    /// Find the entry for a (phone_number, queue_name) pair
    async fn find(
        &self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<Option<QueueEntry>>;

    /// All entries of one queue, ordered by position
    async fn list_queue(&self, queue_name: &QueueName) -> Result<Vec<QueueEntry>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{NewQueueEntry, Position};
    use crate::error::AppError;
    use crate::port::transaction::{
        QueueRepositoryTransaction, Transaction, TransactionalQueueRepository,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    #[derive(Debug, Clone, Default)]
    struct MemState {
        next_id: i64,
        entries: Vec<QueueEntry>,
    }

    /// In-memory record store with failure injection.
    ///
    /// A transaction holds the store lock for its whole lifetime and works
    /// on a copy that replaces the shared state on commit.
    #[derive(Clone, Default)]
    pub struct InMemoryQueueRepository {
        state: Arc<Mutex<MemState>>,
        fail_reads: Arc<AtomicBool>,
        fail_writes: Arc<AtomicBool>,
    }

    impl InMemoryQueueRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `count_by_queue` fail with `StoreUnavailable` until reset
        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// Make `insert` and `shift_positions` fail with `StoreUnavailable`.
        ///
        /// `delete` still succeeds, so a leave fails halfway through its
        /// transaction and must roll back.
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub async fn entries(&self) -> Vec<QueueEntry> {
            self.state.lock().await.entries.clone()
        }

        /// Block every transaction until the returned hold is dropped
        pub async fn hold(&self) -> StoreHold {
            StoreHold {
                _guard: Arc::clone(&self.state).lock_owned().await,
            }
        }
    }

    pub struct StoreHold {
        _guard: OwnedMutexGuard<MemState>,
    }

    #[async_trait]
    impl QueueRepository for InMemoryQueueRepository {
        async fn count_by_queue(&self, tracked: &[QueueName]) -> Result<AggregationSnapshot> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::StoreUnavailable(
                    "injected read failure".to_string(),
                ));
            }

            let state = self.state.lock().await;
            let mut snapshot = AggregationSnapshot::new();
            for queue in tracked {
                snapshot.insert(queue.as_str(), 0);
            }
            for entry in &state.entries {
                if tracked.is_empty() || tracked.contains(&entry.queue_name) {
                    let count = snapshot.count(entry.queue_name.as_str()).unwrap_or(0);
                    snapshot.insert(entry.queue_name.as_str(), count + 1);
                }
            }
            Ok(snapshot)
        }

        async fn find(
            &self,
            phone_number: &PhoneNumber,
            queue_name: &QueueName,
        ) -> Result<Option<QueueEntry>> {
            let state = self.state.lock().await;
            Ok(state
                .entries
                .iter()
                .find(|e| &e.phone_number == phone_number && &e.queue_name == queue_name)
                .cloned())
        }

        async fn list_queue(&self, queue_name: &QueueName) -> Result<Vec<QueueEntry>> {
            let state = self.state.lock().await;
            let mut entries: Vec<QueueEntry> = state
                .entries
                .iter()
                .filter(|e| &e.queue_name == queue_name)
                .cloned()
                .collect();
            entries.sort_by_key(|e| e.position);
            Ok(entries)
        }
    }

    #[async_trait]
    impl TransactionalQueueRepository for InMemoryQueueRepository {
        async fn begin_transaction(&self) -> Result<Box<dyn QueueRepositoryTransaction>> {
            let guard = Arc::clone(&self.state).lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(InMemoryTransaction {
                guard,
                working,
                fail_writes: Arc::clone(&self.fail_writes),
            }))
        }
    }

    pub struct InMemoryTransaction {
        guard: OwnedMutexGuard<MemState>,
        working: MemState,
        fail_writes: Arc<AtomicBool>,
    }

    impl InMemoryTransaction {
        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::StoreUnavailable(
                    "injected write failure".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transaction for InMemoryTransaction {
        async fn commit(mut self: Box<Self>) -> Result<()> {
            *self.guard = std::mem::take(&mut self.working);
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl QueueRepositoryTransaction for InMemoryTransaction {
        async fn insert(&mut self, entry: &NewQueueEntry) -> Result<QueueEntry> {
            self.check_writable()?;
            let exists = self.working.entries.iter().any(|e| {
                e.phone_number == entry.phone_number && e.queue_name == entry.queue_name
            });
            if exists {
                return Err(AppError::ConstraintViolation(format!(
                    "UNIQUE constraint failed: queue.phone_number, queue.queue_name ({}, {})",
                    entry.phone_number, entry.queue_name
                )));
            }

            let max_position = self
                .working
                .entries
                .iter()
                .filter(|e| e.queue_name == entry.queue_name)
                .map(|e| e.position)
                .max()
                .unwrap_or(0);

            self.working.next_id += 1;
            let created = QueueEntry {
                id: self.working.next_id,
                created_at: chrono::Utc::now().timestamp_millis(),
                phone_number: entry.phone_number.clone(),
                queue_name: entry.queue_name.clone(),
                position: max_position + 1,
            };
            self.working.entries.push(created.clone());
            Ok(created)
        }

        async fn delete(
            &mut self,
            phone_number: &PhoneNumber,
            queue_name: &QueueName,
        ) -> Result<Option<QueueEntry>> {
            let index = self
                .working
                .entries
                .iter()
                .position(|e| &e.phone_number == phone_number && &e.queue_name == queue_name);
            Ok(index.map(|i| self.working.entries.remove(i)))
        }

        async fn shift_positions(
            &mut self,
            queue_name: &QueueName,
            above: Position,
            delta: i64,
        ) -> Result<u64> {
            self.check_writable()?;
            let mut affected = 0;
            for entry in self
                .working
                .entries
                .iter_mut()
                .filter(|e| &e.queue_name == queue_name && e.position > above)
            {
                entry.position += delta;
                affected += 1;
            }
            Ok(affected)
        }
    }
}
