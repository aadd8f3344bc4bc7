// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Duplicate key on insert (store contract)
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Transient connectivity/lock/timeout failure talking to the store
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Tick-level read failure in the aggregation loop
    #[error("Aggregation failure: {0}")]
    AggregationFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by classifying into ConstraintViolation / StoreUnavailable / Database
