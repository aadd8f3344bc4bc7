// Transaction port for atomic operations

use crate::domain::{NewQueueEntry, PhoneNumber, Position, QueueEntry, QueueName};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional QueueRepository operations
#[async_trait]
pub trait TransactionalQueueRepository: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn QueueRepositoryTransaction>>;
}

/// Position-affecting mutations, only available inside a transaction
#[async_trait]
pub trait QueueRepositoryTransaction: Transaction {
    /// Insert at position `MAX(position) + 1` of the entry's queue.
    ///
    /// Fails with `AppError::ConstraintViolation` if the
    /// (phone_number, queue_name) pair already exists.
    async fn insert(&mut self, entry: &NewQueueEntry) -> Result<QueueEntry>;

    /// Delete the pair and return the removed row (`None` = not found)
    async fn delete(
        &mut self,
        phone_number: &PhoneNumber,
        queue_name: &QueueName,
    ) -> Result<Option<QueueEntry>>;

    /// `position = position + delta` for every entry of `queue_name`
    /// with `position > above`, as one batch. Returns rows affected.
    async fn shift_positions(
        &mut self,
        queue_name: &QueueName,
        above: Position,
        delta: i64,
    ) -> Result<u64>;
}
