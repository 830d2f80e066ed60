//! Domain models for the ledger.

pub mod account;
pub mod audit;
pub mod customer;
pub mod entry;
pub mod money;

pub use account::{Account, AccountId, AccountNumber};
pub use audit::{AuditAction, AuditEvent};
pub use customer::{Customer, CustomerId, CustomerStatus};
pub use entry::{EntryId, EntryKind, EntryStatus, LedgerEntry};
pub use exchange_rates::{CurrencyCode, RateQuote as ExchangeRate};
pub use money::Money;
