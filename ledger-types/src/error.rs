//! Error types for the ledger.

use rust_decimal::Decimal;

use crate::domain::CurrencyCode;

/// Domain-level errors (business rule violations on values).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch {
        expected: CurrencyCode,
        got: CurrencyCode,
    },

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
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

    #[error("Timed out waiting for a lock")]
    LockTimeout,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors.
///
/// These are faults, not business outcomes: a rejected transfer is a
/// successful call that returns a non-`OK` outcome code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Exchange rate not found for {from} -> {to}")]
    RateNotFound { from: CurrencyCode, to: CurrencyCode },

    #[error("Timed out waiting for a lock")]
    LockTimeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::RateNotFound { .. } => "RATE_NOT_FOUND",
            AppError::LockTimeout => "LOCK_TIMEOUT",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            // A debit that fails after the sufficiency check means the row
            // changed underneath us.
            DomainError::InsufficientFunds { .. } => AppError::Internal(err.to_string()),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::LockTimeout => AppError::LockTimeout,
            RepoError::NotFound => AppError::Internal("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
        }
    }
}
