//! HTTP Request/Response Types

use callq_core::domain::{DomainError, PhoneNumber, Position, QueueName};
use serde::{Deserialize, Serialize};

/// Body of `POST /queue/increment` and `POST /queue/decrement`
#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub phone_number: String,
    pub queue_name: String,
}

impl QueueRequest {
    pub fn parse(&self) -> Result<(PhoneNumber, QueueName), DomainError> {
        Ok((
            PhoneNumber::parse(&self.phone_number)?,
            QueueName::parse(&self.queue_name)?,
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinResponse {
    pub position: Position,
}

/// Serializes as `{}`
#[derive(Debug, Clone, Serialize)]
pub struct LeaveResponse {}

#[derive(Debug, Clone, Serialize)]
pub struct PositionResponse {
    pub phone_number: String,
    pub queue_name: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub subscribers: usize,
}
