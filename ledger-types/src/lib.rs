//! # Ledger Types
//!
//! Domain types and port traits for the multi-currency ledger.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Customer, Account, LedgerEntry, AuditEvent)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Requests, outcome codes and reports crossing the API boundary
//! - `error/` - Domain, repository and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Account, AccountId, AccountNumber, AuditAction, AuditEvent, CurrencyCode, Customer,
    CustomerId, CustomerStatus, EntryId, EntryKind, EntryStatus, ExchangeRate, LedgerEntry, Money,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use ports::{
    AccountStore, AdminStore, AuditEmitter, CustomerStore, LedgerRepository, LedgerStore,
    NamedLockGuard, NamedMutex, RateStore, UnitOfWork,
};
pub use rust_decimal::Decimal;
