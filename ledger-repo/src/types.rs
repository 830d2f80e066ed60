//! Database row types and parsing helpers shared by the SQL adapters.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use ledger_types::{
    Account, AccountId, AccountNumber, CurrencyCode, Customer, CustomerId, CustomerStatus,
    EntryId, EntryKind, EntryStatus, LedgerEntry, Money, RepoError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_currency(s: &str) -> Result<CurrencyCode, RepoError> {
    s.parse()
        .map_err(|e: exchange_rates::UnknownCurrency| RepoError::Database(e.to_string()))
}

pub fn parse_customer_status(s: &str) -> Result<CustomerStatus, RepoError> {
    s.parse().map_err(RepoError::Domain)
}

pub fn parse_entry_kind(s: &str) -> Result<EntryKind, RepoError> {
    match s {
        "TRANSFER" => Ok(EntryKind::Transfer),
        "DEPOSIT" => Ok(EntryKind::Deposit),
        "WITHDRAWAL" => Ok(EntryKind::Withdrawal),
        "SALARY" => Ok(EntryKind::Salary),
        _ => Err(RepoError::Database(format!("Unknown entry kind: {}", s))),
    }
}

pub fn parse_entry_status(s: &str) -> Result<EntryStatus, RepoError> {
    match s {
        "PENDING" => Ok(EntryStatus::Pending),
        "COMPLETED" => Ok(EntryStatus::Completed),
        "FAILED" => Ok(EntryStatus::Failed),
        _ => Err(RepoError::Database(format!("Unknown entry status: {}", s))),
    }
}

fn parse_number(s: String) -> Result<AccountNumber, RepoError> {
    AccountNumber::new(s).map_err(RepoError::Domain)
}

fn balance(amount: Decimal, currency: &str) -> Result<Money, RepoError> {
    Money::new(amount, parse_currency(currency)?).map_err(RepoError::Domain)
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite rows (TEXT-encoded uuids, decimals and timestamps)
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-width timestamp so lexicographic order matches time order.
#[cfg(feature = "sqlite")]
pub fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(feature = "sqlite")]
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
pub fn parse_decimal(s: &str) -> Result<Decimal, RepoError> {
    s.parse::<Decimal>()
        .map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteAccount {
    pub id: String,
    pub number: String,
    pub customer_id: Option<String>,
    pub currency: String,
    pub balance: String,
    pub is_active: i64,
    pub created_at: String,
}

#[cfg(feature = "sqlite")]
impl SqliteAccount {
    pub fn into_domain(self) -> Result<Account, RepoError> {
        Ok(Account {
            id: AccountId::from_uuid(parse_uuid(&self.id)?),
            number: parse_number(self.number)?,
            customer_id: self
                .customer_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?
                .map(CustomerId::from_uuid),
            balance: balance(parse_decimal(&self.balance)?, &self.currency)?,
            is_active: self.is_active != 0,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteCustomer {
    pub id: String,
    pub national_id: String,
    pub name: String,
    pub status: String,
    pub daily_limit: String,
    pub created_at: String,
}

#[cfg(feature = "sqlite")]
impl SqliteCustomer {
    pub fn into_domain(self) -> Result<Customer, RepoError> {
        Ok(Customer {
            id: CustomerId::from_uuid(parse_uuid(&self.id)?),
            national_id: self.national_id,
            name: self.name,
            status: parse_customer_status(&self.status)?,
            daily_limit: parse_decimal(&self.daily_limit)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteEntry {
    pub id: String,
    pub kind: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
    pub amount_ref: String,
    pub source_account_id: Option<String>,
    pub destination_account_id: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

#[cfg(feature = "sqlite")]
impl SqliteEntry {
    pub fn into_domain(self) -> Result<LedgerEntry, RepoError> {
        let account = |s: Option<String>| -> Result<Option<AccountId>, RepoError> {
            s.as_deref()
                .map(parse_uuid)
                .transpose()
                .map(|id| id.map(AccountId::from_uuid))
        };

        Ok(LedgerEntry::from_parts(
            EntryId::from_uuid(parse_uuid(&self.id)?),
            parse_entry_kind(&self.kind)?,
            parse_entry_status(&self.status)?,
            balance(parse_decimal(&self.amount)?, &self.currency)?,
            parse_decimal(&self.amount_ref)?,
            account(self.source_account_id)?,
            account(self.destination_account_id)?,
            self.description,
            parse_ts(&self.created_at)?,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL rows (native UUID, NUMERIC and TIMESTAMPTZ)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgAccount {
    pub id: uuid::Uuid,
    pub number: String,
    pub customer_id: Option<uuid::Uuid>,
    pub currency: String,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
impl PgAccount {
    pub fn into_domain(self) -> Result<Account, RepoError> {
        Ok(Account {
            id: AccountId::from_uuid(self.id),
            number: parse_number(self.number)?,
            customer_id: self.customer_id.map(CustomerId::from_uuid),
            balance: balance(self.balance, &self.currency)?,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgCustomer {
    pub id: uuid::Uuid,
    pub national_id: String,
    pub name: String,
    pub status: String,
    pub daily_limit: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
impl PgCustomer {
    pub fn into_domain(self) -> Result<Customer, RepoError> {
        Ok(Customer {
            id: CustomerId::from_uuid(self.id),
            national_id: self.national_id,
            name: self.name,
            status: parse_customer_status(&self.status)?,
            daily_limit: self.daily_limit,
            created_at: self.created_at,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgEntry {
    pub id: uuid::Uuid,
    pub kind: String,
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
    pub amount_ref: Decimal,
    pub source_account_id: Option<uuid::Uuid>,
    pub destination_account_id: Option<uuid::Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
impl PgEntry {
    pub fn into_domain(self) -> Result<LedgerEntry, RepoError> {
        Ok(LedgerEntry::from_parts(
            EntryId::from_uuid(self.id),
            parse_entry_kind(&self.kind)?,
            parse_entry_status(&self.status)?,
            balance(self.amount, &self.currency)?,
            self.amount_ref,
            self.source_account_id.map(AccountId::from_uuid),
            self.destination_account_id.map(AccountId::from_uuid),
            self.description,
            self.created_at,
        ))
    }
}
