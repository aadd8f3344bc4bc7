// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Caller {phone_number} is already in queue {queue_name}")]
    DuplicateMembership {
        phone_number: String,
        queue_name: String,
    },

    #[error("Caller {phone_number} is not in queue {queue_name}")]
    NotInQueue {
        phone_number: String,
        queue_name: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
