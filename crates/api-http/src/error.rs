//! HTTP Error Types
//!
//! Maps application errors to status codes and the `{"error": {code, message}}` body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use callq_core::domain::DomainError;
use callq_core::error::AppError;
use serde::Serialize;
use tracing::error;

/// Error codes carried in the response body
pub mod code {
    pub const DUPLICATE_MEMBERSHIP: &str = "DUPLICATE_MEMBERSHIP";
    pub const NOT_IN_QUEUE: &str = "NOT_IN_QUEUE";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code::VALIDATION_ERROR, message)
    }

    pub fn not_in_queue(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code::NOT_IN_QUEUE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code::INTERNAL_ERROR, message)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::DuplicateMembership { .. } => {
                Self::new(StatusCode::CONFLICT, code::DUPLICATE_MEMBERSHIP, message)
            }
            DomainError::NotInQueue { .. } => Self::not_in_queue(message),
            DomainError::ValidationError(_) => Self::validation(message),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(e) => e.into(),
            AppError::ConstraintViolation(msg) => {
                Self::new(StatusCode::CONFLICT, code::DUPLICATE_MEMBERSHIP, msg)
            }
            AppError::StoreUnavailable(_) | AppError::AggregationFailure(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                code::STORE_UNAVAILABLE,
                err.to_string(),
            ),
            AppError::Database(_) | AppError::Config(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                code::INTERNAL_ERROR,
                err.to_string(),
            ),
        }
    }
}

/// Malformed JSON, wrong content type and missing fields are all client input errors
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, message = %self.message, "Request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
