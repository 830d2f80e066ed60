//! Storage ports.
//!
//! All reads and writes of one logical operation go through a single
//! [`UnitOfWork`]. Row locks taken through it are held until it is committed
//! or dropped; dropping without `commit` discards every write.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{
    Account, AccountId, AccountNumber, CurrencyCode, Customer, CustomerId, LedgerEntry, Money,
};
use crate::error::RepoError;

#[async_trait::async_trait]
pub trait AccountStore: Send {
    /// Locks the account row exclusively. `None` when no such account exists.
    async fn lock_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError>;

    /// Reads the account without locking it.
    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError>;

    /// Locks the account row exclusively. A missing row is `RepoError::NotFound`.
    async fn lock_account_by_id(&mut self, id: AccountId) -> Result<Account, RepoError>;

    /// Overwrites the balance of an account locked by this unit of work.
    async fn update_balance(&mut self, id: AccountId, balance: Money) -> Result<(), RepoError>;

    /// First active account of the customer, by opening time. Not locked.
    async fn find_active_account_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<Account>, RepoError>;
}

#[async_trait::async_trait]
pub trait CustomerStore: Send {
    async fn find_by_national_id(&mut self, national_id: &str)
    -> Result<Option<Customer>, RepoError>;

    /// A missing row is `RepoError::NotFound`.
    async fn find_customer(&mut self, id: CustomerId) -> Result<Customer, RepoError>;
}

#[async_trait::async_trait]
pub trait LedgerStore: Send {
    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), RepoError>;

    /// Sum of `amount_ref` over completed entries sourced from `account_id`
    /// and created on `day` (UTC).
    async fn sum_completed_today_by_source(
        &mut self,
        account_id: AccountId,
        day: NaiveDate,
    ) -> Result<Decimal, RepoError>;
}

#[async_trait::async_trait]
pub trait RateStore: Send {
    /// Most recently effective rate for the exact directed pair.
    async fn latest_rate(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<Decimal>, RepoError>;
}

/// One storage transaction spanning every store.
#[async_trait::async_trait]
pub trait UnitOfWork: AccountStore + CustomerStore + LedgerStore + RateStore + Sized {
    /// Makes every write visible and releases all row locks.
    async fn commit(self) -> Result<(), RepoError>;
}

/// Factory for units of work; this is what the application layer holds.
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    type Uow: UnitOfWork + 'static;

    async fn begin(&self) -> Result<Self::Uow, RepoError>;
}
