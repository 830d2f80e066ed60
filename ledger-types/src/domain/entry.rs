//! Ledger entry domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;
use super::money::Money;

/// Unique identifier for a LedgerEntry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What kind of money movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Money moving between two accounts in the system
    Transfer,
    /// Money coming into an account from an external source
    Deposit,
    /// Money leaving an account to an external destination
    Withdrawal,
    /// Payroll disbursement from a funding account
    Salary,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Transfer => "TRANSFER",
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Withdrawal => "WITHDRAWAL",
            EntryKind::Salary => "SALARY",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded money movement.
///
/// Entries are immutable once written. Only completed movements are ever
/// written by the engine, so the daily-limit sum never sees rejected attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub status: EntryStatus,
    /// Amount in the currency the operation was stated in
    pub amount: Money,
    /// The same amount converted into the reference currency
    pub amount_ref: Decimal,
    /// Source account (None for deposits from external)
    pub source_account_id: Option<AccountId>,
    /// Destination account (None for withdrawals to external)
    pub destination_account_id: Option<AccountId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn completed(
        kind: EntryKind,
        source: Option<AccountId>,
        destination: Option<AccountId>,
        amount: Money,
        amount_ref: Decimal,
        description: Option<String>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            kind,
            status: EntryStatus::Completed,
            amount,
            amount_ref,
            source_account_id: source,
            destination_account_id: destination,
            description,
            created_at: Utc::now(),
        }
    }

    /// Creates a completed transfer entry.
    pub fn transfer(
        source: AccountId,
        destination: AccountId,
        amount: Money,
        amount_ref: Decimal,
        description: Option<String>,
    ) -> Self {
        Self::completed(
            EntryKind::Transfer,
            Some(source),
            Some(destination),
            amount,
            amount_ref,
            description,
        )
    }

    /// Creates a completed salary entry.
    pub fn salary(
        funding: AccountId,
        recipient: AccountId,
        amount: Money,
        amount_ref: Decimal,
        description: Option<String>,
    ) -> Self {
        Self::completed(
            EntryKind::Salary,
            Some(funding),
            Some(recipient),
            amount,
            amount_ref,
            description,
        )
    }

    /// Creates a completed deposit entry.
    pub fn deposit(
        destination: AccountId,
        amount: Money,
        amount_ref: Decimal,
        description: Option<String>,
    ) -> Self {
        Self::completed(
            EntryKind::Deposit,
            None,
            Some(destination),
            amount,
            amount_ref,
            description,
        )
    }

    /// Creates a completed withdrawal entry.
    pub fn withdrawal(
        source: AccountId,
        amount: Money,
        amount_ref: Decimal,
        description: Option<String>,
    ) -> Self {
        Self::completed(
            EntryKind::Withdrawal,
            Some(source),
            None,
            amount,
            amount_ref,
            description,
        )
    }

    /// Reconstructs an entry from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: EntryId,
        kind: EntryKind,
        status: EntryStatus,
        amount: Money,
        amount_ref: Decimal,
        source_account_id: Option<AccountId>,
        destination_account_id: Option<AccountId>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            status,
            amount,
            amount_ref,
            source_account_id,
            destination_account_id,
            description,
            created_at,
        }
    }
}
