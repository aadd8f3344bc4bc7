// Port Layer - Interfaces for external dependencies

pub mod queue_repository;
pub mod transaction;

// Re-exports
pub use queue_repository::QueueRepository;
pub use transaction::{QueueRepositoryTransaction, Transaction, TransactionalQueueRepository};
