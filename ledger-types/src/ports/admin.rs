//! Administrative port: onboarding, rate publication and read-back.
//!
//! Not part of the money-movement path; used for seeding and by tests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Account, AccountId, AccountNumber, CurrencyCode, Customer, CustomerId, CustomerStatus,
    LedgerEntry,
};
use crate::dto::{NewAccount, NewCustomer};
use crate::error::RepoError;

#[async_trait::async_trait]
pub trait AdminStore: Send + Sync {
    /// Onboards an active customer. Duplicate national IDs are `RepoError::Conflict`.
    async fn create_customer(&self, req: NewCustomer) -> Result<Customer, RepoError>;

    /// Opens an active account. Duplicate numbers are `RepoError::Conflict`.
    async fn open_account(&self, req: NewAccount) -> Result<Account, RepoError>;

    async fn set_customer_status(
        &self,
        id: CustomerId,
        status: CustomerStatus,
    ) -> Result<(), RepoError>;

    async fn set_account_active(&self, id: AccountId, active: bool) -> Result<(), RepoError>;

    async fn record_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        effective_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    /// Unlocked read of an account.
    async fn get_account(&self, number: &AccountNumber) -> Result<Option<Account>, RepoError>;

    /// Entries where the account is source or destination, newest first.
    async fn list_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, RepoError>;
}
