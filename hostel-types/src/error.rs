//! Error types for the hostel payments service.

use rust_decimal::Decimal;

use crate::domain::Currency;
use crate::ports::GatewayError;

/// Domain-level errors (business rule violations).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Amount is out of range")]
    AmountOutOfRange,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Invalid {entity} status transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} is {status}; only {allowed:?} may be changed")]
    TerminalState {
        entity: &'static str,
        status: String,
        allowed: Vec<&'static str>,
    },

    #[error("Refund of {requested} exceeds refundable amount {refundable}")]
    RefundExceedsPayment {
        requested: Decimal,
        refundable: Decimal,
    },

    #[error("Booking total {got} does not match rent x duration {expected}")]
    BookingTotalMismatch { expected: Decimal, got: Decimal },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::ValidationError(msg.into())
    }
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { .. } | DomainError::TerminalState { .. } => {
                AppError::Conflict(err.to_string())
            }
            DomainError::ValidationError(msg) => AppError::BadRequest(msg),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(msg) => AppError::BadRequest(msg),
            e => AppError::Gateway(e.to_string()),
        }
    }
}
