// Domain Layer - Pure business logic and entities

pub mod entry;
pub mod error;
pub mod queue;
pub mod snapshot;

// Re-exports
pub use entry::{EntryId, NewQueueEntry, Position, QueueEntry};
pub use error::DomainError;
pub use queue::{PhoneNumber, QueueName};
pub use snapshot::{AggregationSnapshot, SummaryMessage};
