//! SQLite repository adapter.
//!
//! SQLite has no row locks. A unit of work claims an account with a no-op
//! `UPDATE ... RETURNING`, which takes the database write lock for the rest
//! of the transaction; contenders wait up to `busy_timeout`.
#![allow(clippy::collapsible_if)]

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};

use ledger_types::{
    Account, AccountId, AccountNumber, AccountStore, AdminStore, CurrencyCode, Customer,
    CustomerId, CustomerStatus, CustomerStore, LedgerEntry, LedgerRepository, LedgerStore, Money,
    NewAccount, NewCustomer, RateStore, RepoError, UnitOfWork,
};

use crate::types::{SqliteAccount, SqliteCustomer, SqliteEntry, fmt_ts, parse_decimal};

const ACCOUNT_COLUMNS: &str = "id, number, customer_id, currency, balance, is_active, created_at";
const CUSTOMER_COLUMNS: &str = "id, national_id, name, status, daily_limit, created_at";
const ENTRY_COLUMNS: &str = "id, kind, status, amount, currency, amount_ref, source_account_id, \
                             destination_account_id, description, created_at";

/// Maps driver errors, turning lock contention into `RepoError::LockTimeout`.
fn db_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::PoolTimedOut => RepoError::LockTimeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            Some("5") | Some("6") | Some("261") | Some("517") | Some("262") => {
                RepoError::LockTimeout
            }
            _ => RepoError::Database(e.to_string()),
        },
        _ => RepoError::Database(e.to_string()),
    }
}

fn day_bounds(day: NaiveDate) -> (String, String) {
    let start: DateTime<Utc> = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (fmt_ts(start), fmt_ts(start + chrono::Duration::days(1)))
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Connects, creating the database file if needed, and runs the migration.
    pub async fn new(database_url: &str, lock_timeout: Duration) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if !in_memory {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(lock_timeout);

        // Every in-memory connection is its own database, so keep exactly one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };
        let pool = pool_options
            .acquire_timeout(lock_timeout)
            .connect_with(options)
            .await?;

        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LedgerRepository for SqliteRepo {
    type Uow = SqliteUnitOfWork;

    async fn begin(&self) -> Result<SqliteUnitOfWork, RepoError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(SqliteUnitOfWork { tx })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit of work
// ─────────────────────────────────────────────────────────────────────────────

/// One SQLite transaction. Dropping it rolls back.
pub struct SqliteUnitOfWork {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl AccountStore for SqliteUnitOfWork {
    async fn lock_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError> {
        let sql = format!(
            "UPDATE accounts SET balance = balance WHERE number = ? RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row: Option<SqliteAccount> = sqlx::query_as(&sql)
            .bind(number.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(SqliteAccount::into_domain).transpose()
    }

    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError> {
        let sql = format!("SELECT {} FROM accounts WHERE number = ?", ACCOUNT_COLUMNS);
        let row: Option<SqliteAccount> = sqlx::query_as(&sql)
            .bind(number.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(SqliteAccount::into_domain).transpose()
    }

    async fn lock_account_by_id(&mut self, id: AccountId) -> Result<Account, RepoError> {
        let sql = format!(
            "UPDATE accounts SET balance = balance WHERE id = ? RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row: Option<SqliteAccount> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn update_balance(&mut self, id: AccountId, balance: Money) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE accounts SET balance = ? WHERE id = ? AND currency = ?")
            .bind(balance.amount().to_string())
            .bind(id.to_string())
            .bind(balance.currency().code())
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::Conflict(format!(
                "account {} has no {} balance",
                id,
                balance.currency()
            )));
        }
        Ok(())
    }

    async fn find_active_account_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Option<Account>, RepoError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE customer_id = ? AND is_active = 1 \
             ORDER BY created_at, rowid LIMIT 1",
            ACCOUNT_COLUMNS
        );
        let row: Option<SqliteAccount> = sqlx::query_as(&sql)
            .bind(customer_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(SqliteAccount::into_domain).transpose()
    }
}

#[async_trait]
impl CustomerStore for SqliteUnitOfWork {
    async fn find_by_national_id(
        &mut self,
        national_id: &str,
    ) -> Result<Option<Customer>, RepoError> {
        let sql = format!(
            "SELECT {} FROM customers WHERE national_id = ?",
            CUSTOMER_COLUMNS
        );
        let row: Option<SqliteCustomer> = sqlx::query_as(&sql)
            .bind(national_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(SqliteCustomer::into_domain).transpose()
    }

    async fn find_customer(&mut self, id: CustomerId) -> Result<Customer, RepoError> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?", CUSTOMER_COLUMNS);
        let row: Option<SqliteCustomer> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }
}

#[async_trait]
impl LedgerStore for SqliteUnitOfWork {
    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO ledger_entries
               (id, kind, status, amount, currency, amount_ref,
                source_account_id, destination_account_id, description, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.kind.as_str())
        .bind(entry.status.as_str())
        .bind(entry.amount.amount().to_string())
        .bind(entry.amount.currency().code())
        .bind(entry.amount_ref.to_string())
        .bind(entry.source_account_id.map(|id| id.to_string()))
        .bind(entry.destination_account_id.map(|id| id.to_string()))
        .bind(entry.description.as_deref())
        .bind(fmt_ts(entry.created_at))
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn sum_completed_today_by_source(
        &mut self,
        account_id: AccountId,
        day: NaiveDate,
    ) -> Result<Decimal, RepoError> {
        let (start, end) = day_bounds(day);

        // Decimals are TEXT here, so the sum is taken exactly in Rust.
        let amounts: Vec<String> = sqlx::query_scalar(
            r#"SELECT amount_ref FROM ledger_entries
               WHERE source_account_id = ? AND status = 'COMPLETED'
                 AND created_at >= ? AND created_at < ?"#,
        )
        .bind(account_id.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        amounts
            .iter()
            .try_fold(Decimal::ZERO, |acc, s| Ok(acc + parse_decimal(s)?))
    }
}

#[async_trait]
impl RateStore for SqliteUnitOfWork {
    async fn latest_rate(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<Decimal>, RepoError> {
        let rate: Option<String> = sqlx::query_scalar(
            r#"SELECT rate FROM exchange_rates
               WHERE from_currency = ? AND to_currency = ? AND effective_at <= ?
               ORDER BY effective_at DESC, id DESC LIMIT 1"#,
        )
        .bind(from.code())
        .bind(to.code())
        .bind(fmt_ts(Utc::now()))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        rate.as_deref().map(parse_decimal).transpose()
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn commit(self) -> Result<(), RepoError> {
        self.tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Administration
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AdminStore for SqliteRepo {
    async fn create_customer(&self, req: NewCustomer) -> Result<Customer, RepoError> {
        let customer =
            Customer::new(req.national_id, req.name, req.daily_limit).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO customers (id, national_id, name, status, daily_limit, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.national_id)
        .bind(&customer.name)
        .bind(customer.status.as_str())
        .bind(customer.daily_limit.to_string())
        .bind(fmt_ts(customer.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(customer)
    }

    async fn open_account(&self, req: NewAccount) -> Result<Account, RepoError> {
        if let Some(customer_id) = req.customer_id {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM customers WHERE id = ?")
                    .bind(customer_id.to_string())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
        }

        let mut account = Account::open(req.number, req.customer_id, req.currency);
        let opening = Money::new(req.opening_balance, req.currency).map_err(RepoError::Domain)?;
        account.credit(opening).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO accounts (id, number, customer_id, currency, balance, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, 1, ?)"#,
        )
        .bind(account.id.to_string())
        .bind(account.number.as_str())
        .bind(account.customer_id.map(|id| id.to_string()))
        .bind(account.currency().code())
        .bind(account.balance.amount().to_string())
        .bind(fmt_ts(account.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(account)
    }

    async fn set_customer_status(
        &self,
        id: CustomerId,
        status: CustomerStatus,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE customers SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_account_active(&self, id: AccountId, active: bool) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE accounts SET is_active = ? WHERE id = ?")
            .bind(active as i64)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn record_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        effective_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO exchange_rates (from_currency, to_currency, rate, effective_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(from.code())
        .bind(to.code())
        .bind(rate.to_string())
        .bind(fmt_ts(effective_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_account(&self, number: &AccountNumber) -> Result<Option<Account>, RepoError> {
        let sql = format!("SELECT {} FROM accounts WHERE number = ?", ACCOUNT_COLUMNS);
        let row: Option<SqliteAccount> = sqlx::query_as(&sql)
            .bind(number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(SqliteAccount::into_domain).transpose()
    }

    async fn list_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, RepoError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries \
             WHERE source_account_id = ?1 OR destination_account_id = ?1 \
             ORDER BY created_at DESC",
            ENTRY_COLUMNS
        );
        let rows: Vec<SqliteEntry> = sqlx::query_as(&sql)
            .bind(account_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(SqliteEntry::into_domain).collect()
    }
}
