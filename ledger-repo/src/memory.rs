//! In-memory repository adapter.
//!
//! Every account row sits behind its own `tokio::sync::Mutex`, so row locks
//! block across tasks exactly like `SELECT ... FOR UPDATE` does in Postgres.
//! A [`MemoryUnitOfWork`] buffers its writes and applies them on `commit`;
//! dropping it releases the row guards and discards the buffer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use exchange_rates::RateTable;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use ledger_types::{
    Account, AccountId, AccountNumber, AccountStore, AdminStore, CurrencyCode, Customer,
    CustomerId, CustomerStatus, CustomerStore, EntryStatus, LedgerEntry, LedgerRepository,
    LedgerStore, Money, NewAccount, NewCustomer, RateStore, RepoError, UnitOfWork,
};

/// Default bounded wait for a row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct State {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
    numbers: DashMap<AccountNumber, AccountId>,
    /// Account ids per customer, in opening order
    by_customer: DashMap<CustomerId, Vec<AccountId>>,
    customers: DashMap<CustomerId, Customer>,
    national_ids: DashMap<String, CustomerId>,
    entries: RwLock<Vec<LedgerEntry>>,
    rates: RwLock<RateTable>,
}

impl State {
    fn row(&self, id: AccountId) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(&id).map(|r| r.value().clone())
    }
}

async fn lock_row(
    row: Arc<Mutex<Account>>,
    timeout: Duration,
) -> Result<OwnedMutexGuard<Account>, RepoError> {
    tokio::time::timeout(timeout, row.lock_owned())
        .await
        .map_err(|_| RepoError::LockTimeout)
}

fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Repository
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-safe in-memory ledger store. Cloning shares the same state.
#[derive(Clone)]
pub struct MemoryRepo {
    state: Arc<State>,
    lock_timeout: Duration,
}

impl Default for MemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(State::default()),
            lock_timeout,
        }
    }

    /// Replaces the rate table wholesale.
    pub async fn load_rates(&self, table: RateTable) {
        *self.state.rates.write().await = table;
    }
}

#[async_trait]
impl LedgerRepository for MemoryRepo {
    type Uow = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, RepoError> {
        Ok(MemoryUnitOfWork {
            state: self.state.clone(),
            lock_timeout: self.lock_timeout,
            held: HashMap::new(),
            balances: HashMap::new(),
            entries: Vec::new(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit of work
// ─────────────────────────────────────────────────────────────────────────────

/// One in-memory transaction.
pub struct MemoryUnitOfWork {
    state: Arc<State>,
    lock_timeout: Duration,
    held: HashMap<AccountId, OwnedMutexGuard<Account>>,
    balances: HashMap<AccountId, Money>,
    entries: Vec<LedgerEntry>,
}

impl MemoryUnitOfWork {
    /// The row as this transaction sees it, including uncommitted balances.
    fn view(&self, guard: &Account) -> Account {
        let mut account = guard.clone();
        if let Some(balance) = self.balances.get(&account.id) {
            account.balance = *balance;
        }
        account
    }

    /// Unlocked read: rows held by this transaction come from the guard,
    /// others are read under a momentary lock.
    async fn peek(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
        if let Some(guard) = self.held.get(&id) {
            return Ok(Some(self.view(guard)));
        }
        match self.state.row(id) {
            Some(row) => Ok(Some(lock_row(row, self.lock_timeout).await?.clone())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryUnitOfWork {
    async fn lock_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError> {
        let id = match self.state.numbers.get(number) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.lock_account_by_id(id).await.map(Some)
    }

    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError> {
        let id = match self.state.numbers.get(number) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.peek(id).await
    }

    async fn lock_account_by_id(&mut self, id: AccountId) -> Result<Account, RepoError> {
        if !self.held.contains_key(&id) {
            let row = self.state.row(id).ok_or(RepoError::NotFound)?;
            let guard = lock_row(row, self.lock_timeout).await?;
            self.held.insert(id, guard);
        }
        let guard = self.held.get(&id).ok_or(RepoError::NotFound)?;
        Ok(self.view(guard))
    }

    async fn update_balance(&mut self, id: AccountId, balance: Money) -> Result<(), RepoError> {
        let guard = self
            .held
            .get(&id)
            .ok_or_else(|| RepoError::Conflict(format!("account {} is not locked", id)))?;
        if guard.currency() != balance.currency() {
            return Err(RepoError::Domain(ledger_types::DomainError::CurrencyMismatch {
                expected: guard.currency(),
                got: balance.currency(),
            }));
        }
        self.balances.insert(id, balance);
        Ok(())
    }

    async fn find_active_account_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<Account>, RepoError> {
        let ids = self
            .state
            .by_customer
            .get(&customer_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();

        for id in ids {
            if let Some(account) = self.peek(id).await? {
                if account.is_active {
                    return Ok(Some(account));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl CustomerStore for MemoryUnitOfWork {
    async fn find_by_national_id(
        &mut self,
        national_id: &str,
    ) -> Result<Option<Customer>, RepoError> {
        let id = match self.state.national_ids.get(national_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.state.customers.get(&id).map(|c| c.value().clone()))
    }

    async fn find_customer(&mut self, id: CustomerId) -> Result<Customer, RepoError> {
        self.state
            .customers
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl LedgerStore for MemoryUnitOfWork {
    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), RepoError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    async fn sum_completed_today_by_source(
        &mut self,
        account_id: AccountId,
        day: NaiveDate,
    ) -> Result<Decimal, RepoError> {
        let (start, end) = day_bounds(day);
        let counts = |e: &&LedgerEntry| {
            e.source_account_id == Some(account_id)
                && e.status == EntryStatus::Completed
                && e.created_at >= start
                && e.created_at < end
        };

        let committed = self.state.entries.read().await;
        let total = committed
            .iter()
            .chain(self.entries.iter())
            .filter(counts)
            .map(|e| e.amount_ref)
            .sum();
        Ok(total)
    }
}

#[async_trait]
impl RateStore for MemoryUnitOfWork {
    async fn latest_rate(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<Decimal>, RepoError> {
        Ok(self.state.rates.read().await.latest(from, to))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), RepoError> {
        for (id, balance) in self.balances.drain() {
            if let Some(guard) = self.held.get_mut(&id) {
                guard.balance = balance;
            }
        }
        if !self.entries.is_empty() {
            self.state
                .entries
                .write()
                .await
                .extend(self.entries.drain(..));
        }
        // Guards drop here, releasing the rows.
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Administration
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AdminStore for MemoryRepo {
    async fn create_customer(&self, req: NewCustomer) -> Result<Customer, RepoError> {
        let customer =
            Customer::new(req.national_id, req.name, req.daily_limit).map_err(RepoError::Domain)?;

        match self.state.national_ids.entry(customer.national_id.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Conflict(format!(
                    "national ID {} already registered",
                    customer.national_id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(customer.id);
            }
        }
        self.state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn open_account(&self, req: NewAccount) -> Result<Account, RepoError> {
        if let Some(customer_id) = req.customer_id {
            if !self.state.customers.contains_key(&customer_id) {
                return Err(RepoError::NotFound);
            }
        }

        let mut account = Account::open(req.number, req.customer_id, req.currency);
        let opening = Money::new(req.opening_balance, req.currency).map_err(RepoError::Domain)?;
        account.credit(opening).map_err(RepoError::Domain)?;

        match self.state.numbers.entry(account.number.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Conflict(format!(
                    "account number {} already exists",
                    account.number
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(account.id);
            }
        }
        self.state
            .accounts
            .insert(account.id, Arc::new(Mutex::new(account.clone())));
        if let Some(customer_id) = account.customer_id {
            self.state
                .by_customer
                .entry(customer_id)
                .or_default()
                .push(account.id);
        }
        Ok(account)
    }

    async fn set_customer_status(
        &self,
        id: CustomerId,
        status: CustomerStatus,
    ) -> Result<(), RepoError> {
        let mut customer = self.state.customers.get_mut(&id).ok_or(RepoError::NotFound)?;
        customer.status = status;
        Ok(())
    }

    async fn set_account_active(&self, id: AccountId, active: bool) -> Result<(), RepoError> {
        let row = self.state.row(id).ok_or(RepoError::NotFound)?;
        lock_row(row, self.lock_timeout).await?.is_active = active;
        Ok(())
    }

    async fn record_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        effective_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.state
            .rates
            .write()
            .await
            .insert(from, to, rate, effective_at);
        Ok(())
    }

    async fn get_account(&self, number: &AccountNumber) -> Result<Option<Account>, RepoError> {
        let row = self
            .state
            .numbers
            .get(number)
            .and_then(|id| self.state.row(*id));
        match row {
            Some(row) => Ok(Some(lock_row(row, self.lock_timeout).await?.clone())),
            None => Ok(None),
        }
    }

    async fn list_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, RepoError> {
        let mut entries: Vec<LedgerEntry> = self
            .state
            .entries
            .read()
            .await
            .iter()
            .filter(|e| {
                e.source_account_id == Some(account_id)
                    || e.destination_account_id == Some(account_id)
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn repo_with_account(number: &str, balance: Decimal) -> (MemoryRepo, Account) {
        let repo = MemoryRepo::with_lock_timeout(Duration::from_millis(50));
        let account = repo
            .open_account(NewAccount {
                number: AccountNumber::new(number).unwrap(),
                customer_id: None,
                currency: CurrencyCode::KZT,
                opening_balance: balance,
            })
            .await
            .unwrap();
        (repo, account)
    }

    fn kzt(amount: Decimal) -> Money {
        Money::new(amount, CurrencyCode::KZT).unwrap()
    }

    #[tokio::test]
    async fn test_commit_applies_balance_and_entries() {
        let (repo, account) = repo_with_account("KZ01", dec!(100)).await;

        let mut uow = repo.begin().await.unwrap();
        uow.lock_account_by_id(account.id).await.unwrap();
        uow.update_balance(account.id, kzt(dec!(40))).await.unwrap();
        uow.insert_entry(&LedgerEntry::withdrawal(account.id, kzt(dec!(60)), dec!(60), None))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let stored = repo.get_account(&account.number).await.unwrap().unwrap();
        assert_eq!(stored.balance.amount(), dec!(40));
        assert_eq!(repo.list_entries_for_account(account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let (repo, account) = repo_with_account("KZ01", dec!(100)).await;

        {
            let mut uow = repo.begin().await.unwrap();
            uow.lock_account_by_id(account.id).await.unwrap();
            uow.update_balance(account.id, kzt(dec!(0))).await.unwrap();
        }

        let stored = repo.get_account(&account.number).await.unwrap().unwrap();
        assert_eq!(stored.balance.amount(), dec!(100));
    }

    #[tokio::test]
    async fn test_row_lock_times_out_under_contention() {
        let (repo, account) = repo_with_account("KZ01", dec!(100)).await;

        let mut holder = repo.begin().await.unwrap();
        holder.lock_account_by_id(account.id).await.unwrap();

        let mut waiter = repo.begin().await.unwrap();
        let result = waiter.lock_account_by_id(account.id).await;
        assert!(matches!(result, Err(RepoError::LockTimeout)));

        drop(holder);
        assert!(waiter.lock_account_by_id(account.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_relocking_in_same_uow_sees_own_writes() {
        let (repo, account) = repo_with_account("KZ01", dec!(100)).await;

        let mut uow = repo.begin().await.unwrap();
        uow.lock_account_by_id(account.id).await.unwrap();
        uow.update_balance(account.id, kzt(dec!(75))).await.unwrap();

        let again = uow.lock_account_by_number(&account.number).await.unwrap().unwrap();
        assert_eq!(again.balance.amount(), dec!(75));
    }

    #[tokio::test]
    async fn test_update_requires_lock() {
        let (repo, account) = repo_with_account("KZ01", dec!(100)).await;

        let mut uow = repo.begin().await.unwrap();
        let result = uow.update_balance(account.id, kzt(dec!(1))).await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_missing_number_is_none() {
        let repo = MemoryRepo::new();
        let mut uow = repo.begin().await.unwrap();
        let result = uow
            .lock_account_by_number(&AccountNumber::new("nope").unwrap())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_first_active_account_skips_inactive() {
        let repo = MemoryRepo::new();
        let customer = repo
            .create_customer(NewCustomer {
                national_id: "900101300111".into(),
                name: "Dana".into(),
                daily_limit: dec!(1000),
            })
            .await
            .unwrap();
        let mut opened = Vec::new();
        for number in ["KZ-A", "KZ-B"] {
            opened.push(
                repo.open_account(NewAccount {
                    number: AccountNumber::new(number).unwrap(),
                    customer_id: Some(customer.id),
                    currency: CurrencyCode::KZT,
                    opening_balance: Decimal::ZERO,
                })
                .await
                .unwrap(),
            );
        }
        repo.set_account_active(opened[0].id, false).await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let found = uow
            .find_active_account_for_customer(customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, opened[1].id);
    }

    #[tokio::test]
    async fn test_duplicate_national_id_conflicts() {
        let repo = MemoryRepo::new();
        let req = NewCustomer {
            national_id: "900101300111".into(),
            name: "Dana".into(),
            daily_limit: dec!(1000),
        };
        repo.create_customer(req.clone()).await.unwrap();
        assert!(matches!(
            repo.create_customer(req).await,
            Err(RepoError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_sum_counts_only_own_source_today() {
        let (repo, account) = repo_with_account("KZ01", dec!(100)).await;
        let other = AccountId::new();

        let mut uow = repo.begin().await.unwrap();
        uow.insert_entry(&LedgerEntry::withdrawal(account.id, kzt(dec!(10)), dec!(10), None))
            .await
            .unwrap();
        uow.insert_entry(&LedgerEntry::deposit(account.id, kzt(dec!(99)), dec!(99), None))
            .await
            .unwrap();
        uow.insert_entry(&LedgerEntry::withdrawal(other, kzt(dec!(5)), dec!(5), None))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        assert_eq!(
            uow.sum_completed_today_by_source(account.id, today).await.unwrap(),
            dec!(10)
        );
        assert_eq!(
            uow.sum_completed_today_by_source(account.id, yesterday)
                .await
                .unwrap(),
            Decimal::ZERO
        );
    }
}
