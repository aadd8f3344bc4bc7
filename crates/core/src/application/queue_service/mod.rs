// Queue Position Engine - join/leave use cases

mod locks;

pub use locks::{QueueGuard, QueueLocks};

use crate::domain::{DomainError, NewQueueEntry, PhoneNumber, Position, QueueEntry, QueueName};
use crate::error::{AppError, Result};
use crate::port::{QueueRepository, QueueRepositoryTransaction, TransactionalQueueRepository};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub removed: QueueEntry,
    /// Entries whose position moved down by one
    pub renumbered: u64,
}

/// Queue Position Engine
///
/// Position-affecting operations on one queue run under that queue's lock
/// and inside a single store transaction.
pub struct QueueService {
    tx_repo: Arc<dyn TransactionalQueueRepository>,
    repo: Arc<dyn QueueRepository>,
    locks: QueueLocks,
}

impl QueueService {
    pub fn new(
        tx_repo: Arc<dyn TransactionalQueueRepository>,
        repo: Arc<dyn QueueRepository>,
    ) -> Self {
        Self {
            tx_repo,
            repo,
            locks: QueueLocks::new(),
        }
    }

    /// Add a caller at the back of the queue and return the new entry
    pub async fn join(
        &self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<QueueEntry> {
        let _guard = self.locks.acquire(queue_name).await;

        let mut tx = self.tx_repo.begin_transaction().await?;
        let new_entry = NewQueueEntry::new(phone_number.clone(), queue_name.clone());
        let result = match tx.insert(&new_entry).await {
            Err(AppError::ConstraintViolation(detail)) => {
                debug!(%detail, "Insert rejected by unique constraint");
                Err(DomainError::DuplicateMembership {
                    phone_number: phone_number.to_string(),
                    queue_name: queue_name.to_string(),
                }
                .into())
            }
            other => other,
        };
        let entry = finish(tx, result).await?;

        info!(
            phone_number = %entry.phone_number,
            queue_name = %entry.queue_name,
            position = entry.position,
            "Caller joined queue"
        );
        Ok(entry)
    }

    /// Remove a caller and close the gap behind them
    pub async fn leave(
        &self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<LeaveOutcome> {
        let _guard = self.locks.acquire(queue_name).await;

        let mut tx = self.tx_repo.begin_transaction().await?;
        let result = leave_in_tx(tx.as_mut(), phone_number, queue_name).await;
        let outcome = finish(tx, result).await?;

        info!(
            phone_number = %phone_number,
            queue_name = %queue_name,
            position = outcome.removed.position,
            renumbered = outcome.renumbered,
            "Caller left queue"
        );
        Ok(outcome)
    }

    /// Current position of a caller, if queued
    pub async fn position(
        &self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<Option<Position>> {
        Ok(self
            .repo
            .find(phone_number, queue_name)
            .await?
            .map(|entry| entry.position))
    }

    /// All entries of a queue ordered by position
    pub async fn entries(&self, queue_name: &QueueName) -> Result<Vec<QueueEntry>> {
        self.repo.list_queue(queue_name).await
    }
}

async fn leave_in_tx(
    tx: &mut dyn QueueRepositoryTransaction,
    phone_number: &PhoneNumber,
    queue_name: &QueueName,
) -> Result<LeaveOutcome> {
    let removed = tx
        .delete(phone_number, queue_name)
        .await?
        .ok_or_else(|| DomainError::NotInQueue {
            phone_number: phone_number.to_string(),
            queue_name: queue_name.to_string(),
        })?;

    // Last in line: nothing behind them to renumber
    let renumbered = tx.shift_positions(queue_name, removed.position, -1).await?;

    Ok(LeaveOutcome {
        removed,
        renumbered,
    })
}

/// Commit on success, roll back on failure (keeping the original error)
async fn finish<T>(tx: Box<dyn QueueRepositoryTransaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::queue_repository::mocks::InMemoryQueueRepository;

    fn setup() -> (QueueService, InMemoryQueueRepository) {
        let repo = InMemoryQueueRepository::new();
        let service = QueueService::new(Arc::new(repo.clone()), Arc::new(repo.clone()));
        (service, repo)
    }

    fn phone(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    fn queue(s: &str) -> QueueName {
        QueueName::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_join_assigns_sequential_positions() {
        let (service, _) = setup();
        let sales = queue("Sales");

        for i in 1..=5 {
            let entry = service.join(&phone(&format!("555-000{}", i)), &sales).await.unwrap();
            assert_eq!(entry.position, i);
        }
    }

    #[tokio::test]
    async fn test_duplicate_join_rejected_without_side_effect() {
        let (service, repo) = setup();
        let sales = queue("Sales");

        service.join(&phone("555-1111"), &sales).await.unwrap();
        let err = service.join(&phone("555-1111"), &sales).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Domain(DomainError::DuplicateMembership { .. })
        ));
        assert_eq!(repo.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_caller_may_wait_in_two_queues() {
        let (service, _) = setup();

        let a = service.join(&phone("555-1111"), &queue("Sales")).await.unwrap();
        let b = service.join(&phone("555-1111"), &queue("Support")).await.unwrap();
        assert_eq!(a.position, 1);
        assert_eq!(b.position, 1);
    }

    #[tokio::test]
    async fn test_leave_shifts_later_callers_down() {
        let (service, _) = setup();
        let sales = queue("Sales");
        for p in ["A", "B", "C", "D"] {
            service.join(&phone(p), &sales).await.unwrap();
        }

        let outcome = service.leave(&phone("B"), &sales).await.unwrap();
        assert_eq!(outcome.removed.position, 2);
        assert_eq!(outcome.renumbered, 2);

        let positions: Vec<(String, i64)> = service
            .entries(&sales)
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.phone_number.to_string(), e.position))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("A".to_string(), 1),
                ("C".to_string(), 2),
                ("D".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_leave_last_caller_renumbers_nothing() {
        let (service, _) = setup();
        let sales = queue("Sales");
        service.join(&phone("A"), &sales).await.unwrap();
        service.join(&phone("B"), &sales).await.unwrap();

        let outcome = service.leave(&phone("B"), &sales).await.unwrap();
        assert_eq!(outcome.renumbered, 0);
        assert_eq!(service.position(&phone("A"), &sales).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_leave_non_member_is_not_in_queue() {
        let (service, repo) = setup();
        service.join(&phone("A"), &queue("Sales")).await.unwrap();

        let err = service.leave(&phone("Z"), &queue("Sales")).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::NotInQueue { .. })));

        let err = service.leave(&phone("A"), &queue("Nowhere")).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::NotInQueue { .. })));

        assert_eq!(repo.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_freed_slot_is_reused() {
        let (service, _) = setup();
        let sales = queue("Sales");

        assert_eq!(service.join(&phone("555-1111"), &sales).await.unwrap().position, 1);
        assert_eq!(service.join(&phone("555-2222"), &sales).await.unwrap().position, 2);
        assert!(service.join(&phone("555-1111"), &sales).await.is_err());
        service.leave(&phone("555-1111"), &sales).await.unwrap();
        assert_eq!(service.join(&phone("555-3333"), &sales).await.unwrap().position, 2);
    }

    #[tokio::test]
    async fn test_concurrent_joins_get_distinct_positions() {
        let (service, _) = setup();
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for i in 0..50 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .join(&phone(&format!("555-{:04}", i)), &queue("Sales"))
                    .await
                    .unwrap()
                    .position
            }));
        }

        let mut positions = Vec::new();
        for handle in handles {
            positions.push(handle.await.unwrap());
        }
        positions.sort();
        assert_eq!(positions, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_store_failure_mid_leave_rolls_back() {
        let (service, repo) = setup();
        let sales = queue("Sales");
        for p in ["A", "B", "C"] {
            service.join(&phone(p), &sales).await.unwrap();
        }
        let before = repo.entries().await;

        repo.set_fail_writes(true);
        let err = service.leave(&phone("A"), &sales).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));

        // Delete succeeded inside the transaction but was not kept
        assert_eq!(repo.entries().await, before);
        assert_eq!(service.position(&phone("A"), &sales).await.unwrap(), Some(1));
        assert_eq!(service.position(&phone("C"), &sales).await.unwrap(), Some(3));

        repo.set_fail_writes(false);
        service.leave(&phone("A"), &sales).await.unwrap();
        assert_eq!(service.position(&phone("C"), &sales).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_store_failure_on_join_adds_nothing() {
        let (service, repo) = setup();
        repo.set_fail_writes(true);

        let err = service.join(&phone("A"), &queue("Sales")).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(repo.entries().await.is_empty());
        assert_eq!(service.locks.active(), 0);
    }
}
