// Queue Entry Domain Model

use super::queue::{PhoneNumber, QueueName};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned row identifier
pub type EntryId = i64;

/// 1-based rank of a caller within a queue
pub type Position = i64;

/// One caller's membership in one queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    /// Milliseconds since epoch, set by the store at insert time
    pub created_at: i64,
    pub phone_number: PhoneNumber,
    pub queue_name: QueueName,
    pub position: Position,
}

impl QueueEntry {
    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }
}

/// Insert payload: the store fills in id, created_at and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueEntry {
    pub phone_number: PhoneNumber,
    pub queue_name: QueueName,
}

impl NewQueueEntry {
    pub fn new(phone_number: PhoneNumber, queue_name: QueueName) -> Self {
        Self {
            phone_number,
            queue_name,
        }
    }
}
