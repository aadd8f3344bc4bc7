//! SDK Request/Response Types
//!
//! Mirrors the JSON bodies of the api-http crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Queue name -> caller count
pub type Summary = BTreeMap<String, i64>;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QueueRequest<'a> {
    pub phone_number: &'a str,
    pub queue_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinResponse {
    pub position: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionResponse {
    pub phone_number: String,
    pub queue_name: String,
    pub position: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub subscribers: usize,
}

/// One event of the live summary feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SummaryEvent {
    Error { error: String },
    Counts(Summary),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub code: String,
    pub message: String,
}
