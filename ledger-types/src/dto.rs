//! Data Transfer Objects (DTOs) for requests, outcomes and reports.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountNumber, CurrencyCode, CustomerId, EntryId};
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Movement DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to move money between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    /// Amount in `currency`, which may differ from both accounts' currencies
    pub amount: Decimal,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to credit an account from an external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub account: AccountNumber,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to debit an account to an external destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub account: AccountNumber,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Business outcome of a single movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferOutcome {
    Ok,
    FromNotFound,
    ToNotFound,
    CustomerInactive,
    NoMoney,
    NoMoneyConv,
    LimitExceeded,
}

impl TransferOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            TransferOutcome::Ok => "OK",
            TransferOutcome::FromNotFound => "FROM_NOT_FOUND",
            TransferOutcome::ToNotFound => "TO_NOT_FOUND",
            TransferOutcome::CustomerInactive => "CUSTOMER_INACTIVE",
            TransferOutcome::NoMoney => "NO_MONEY",
            TransferOutcome::NoMoneyConv => "NO_MONEY_CONV",
            TransferOutcome::LimitExceeded => "LIMIT_EXCEEDED",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, TransferOutcome::Ok)
    }
}

impl std::fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of a transfer, deposit or withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementResponse {
    pub outcome: TransferOutcome,
    /// Ledger entry written for an `OK` outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
}

impl MovementResponse {
    pub fn rejected(outcome: TransferOutcome) -> Self {
        Self {
            outcome,
            entry_id: None,
        }
    }

    pub fn ok(entry_id: EntryId) -> Self {
        Self {
            outcome: TransferOutcome::Ok,
            entry_id: Some(entry_id),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payroll DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// One salary line of a payroll batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollItem {
    /// National ID of the recipient customer
    pub national_id: String,
    pub amount: Decimal,
    /// Defaults to the funding account's currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<CurrencyCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to disburse a payroll batch from one funding account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollRequest {
    pub funding_account: AccountNumber,
    pub items: Vec<PayrollItem>,
}

/// Why a whole batch was refused before any item was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayrollRejection {
    NoCompanyAccount,
    NoMoney,
}

impl PayrollRejection {
    pub fn code(&self) -> &'static str {
        match self {
            PayrollRejection::NoCompanyAccount => "NO_COMPANY_ACCOUNT",
            PayrollRejection::NoMoney => "NO_MONEY",
        }
    }
}

/// Why a single payroll item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayrollFailureReason {
    NotFound,
    NoActiveAccount,
    /// The item faulted while being paid; nothing was written for it.
    RateNotFound,
    LockTimeout,
    BadRequest,
    Internal,
}

impl PayrollFailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            PayrollFailureReason::NotFound => "NOT_FOUND",
            PayrollFailureReason::NoActiveAccount => "NO_ACTIVE_ACCOUNT",
            PayrollFailureReason::RateNotFound => "RATE_NOT_FOUND",
            PayrollFailureReason::LockTimeout => "LOCK_TIMEOUT",
            PayrollFailureReason::BadRequest => "BAD_REQUEST",
            PayrollFailureReason::Internal => "INTERNAL",
        }
    }
}

impl From<&AppError> for PayrollFailureReason {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::BadRequest(_) => PayrollFailureReason::BadRequest,
            AppError::RateNotFound { .. } => PayrollFailureReason::RateNotFound,
            AppError::LockTimeout => PayrollFailureReason::LockTimeout,
            AppError::Internal(_) => PayrollFailureReason::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollFailure {
    /// Position of the item in the request
    pub index: usize,
    pub national_id: String,
    pub reason: PayrollFailureReason,
}

/// Aggregate result of a payroll batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PayrollRejection>,
    pub paid_count: usize,
    pub failed_count: usize,
    pub failures: Vec<PayrollFailure>,
}

impl PayrollReport {
    /// The batch was refused as a whole; nothing was paid.
    pub fn rejected(reason: PayrollRejection) -> Self {
        Self {
            success: false,
            error: Some(reason),
            paid_count: 0,
            failed_count: 0,
            failures: Vec::new(),
        }
    }

    /// The batch ran; individual items may still have failed.
    pub fn executed(paid_count: usize, failures: Vec<PayrollFailure>) -> Self {
        Self {
            success: true,
            error: None,
            paid_count,
            failed_count: failures.len(),
            failures,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Administrative DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Onboarding data for a new customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub national_id: String,
    pub name: String,
    pub daily_limit: Decimal,
}

/// Data for opening an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub number: AccountNumber,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub opening_balance: Decimal,
}
