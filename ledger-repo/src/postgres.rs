//! PostgreSQL repository adapter.
//!
//! Account rows are locked with `SELECT ... FOR UPDATE`; the wait is bounded
//! per transaction with `SET LOCAL lock_timeout`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use ledger_types::{
    Account, AccountId, AccountNumber, AccountStore, AdminStore, CurrencyCode, Customer,
    CustomerId, CustomerStatus, CustomerStore, LedgerEntry, LedgerRepository, LedgerStore, Money,
    NewAccount, NewCustomer, RateStore, RepoError, UnitOfWork,
};

use crate::types::{PgAccount, PgCustomer, PgEntry};

const ACCOUNT_COLUMNS: &str = "id, number, customer_id, currency, balance, is_active, created_at";
const CUSTOMER_COLUMNS: &str = "id, national_id, name, status, daily_limit, created_at";
const ENTRY_COLUMNS: &str = "id, kind, status, amount, currency, amount_ref, source_account_id, \
                             destination_account_id, description, created_at";

/// Maps driver errors by SQLSTATE.
fn db_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::PoolTimedOut => RepoError::LockTimeout,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // lock_not_available
            Some("55P03") => RepoError::LockTimeout,
            // unique_violation
            Some("23505") => RepoError::Conflict(db.message().to_string()),
            // deadlock_detected, serialization_failure
            Some("40P01") | Some("40001") => RepoError::Transaction(db.message().to_string()),
            _ => RepoError::Database(e.to_string()),
        },
        _ => RepoError::Database(e.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking.
#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
    lock_timeout: Duration,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

impl PostgresRepo {
    /// Connects and runs the migration.
    pub async fn new(database_url: &str, lock_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        execute_migration(
            &pool,
            include_str!("../migrations/0001_create_tables_pg.sql"),
            "0001",
        )
        .await?;
        Ok(Self { pool, lock_timeout })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerRepository for PostgresRepo {
    type Uow = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // SET does not take bind parameters.
        let stmt = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&stmt)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        Ok(PgUnitOfWork { tx })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit of work
// ─────────────────────────────────────────────────────────────────────────────

/// One PostgreSQL transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountStore for PgUnitOfWork {
    async fn lock_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE number = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        );
        let row: Option<PgAccount> = sqlx::query_as(&sql)
            .bind(number.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(PgAccount::into_domain).transpose()
    }

    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, RepoError> {
        let sql = format!("SELECT {} FROM accounts WHERE number = $1", ACCOUNT_COLUMNS);
        let row: Option<PgAccount> = sqlx::query_as(&sql)
            .bind(number.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(PgAccount::into_domain).transpose()
    }

    async fn lock_account_by_id(&mut self, id: AccountId) -> Result<Account, RepoError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        );
        let row: Option<PgAccount> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn update_balance(&mut self, id: AccountId, balance: Money) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2 AND currency = $3")
            .bind(balance.amount())
            .bind(id.into_uuid())
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
            "SELECT {} FROM accounts WHERE customer_id = $1 AND is_active \
             ORDER BY created_at, id LIMIT 1",
            ACCOUNT_COLUMNS
        );
        let row: Option<PgAccount> = sqlx::query_as(&sql)
            .bind(customer_id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(PgAccount::into_domain).transpose()
    }
}

#[async_trait]
impl CustomerStore for PgUnitOfWork {
    async fn find_by_national_id(
        &mut self,
        national_id: &str,
    ) -> Result<Option<Customer>, RepoError> {
        let sql = format!(
            "SELECT {} FROM customers WHERE national_id = $1",
            CUSTOMER_COLUMNS
        );
        let row: Option<PgCustomer> = sqlx::query_as(&sql)
            .bind(national_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.map(PgCustomer::into_domain).transpose()
    }

    async fn find_customer(&mut self, id: CustomerId) -> Result<Customer, RepoError> {
        let sql = format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS);
        let row: Option<PgCustomer> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }
}

#[async_trait]
impl LedgerStore for PgUnitOfWork {
    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO ledger_entries
               (id, kind, status, amount, currency, amount_ref,
                source_account_id, destination_account_id, description, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(entry.id.into_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.status.as_str())
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().code())
        .bind(entry.amount_ref)
        .bind(entry.source_account_id.map(AccountId::into_uuid))
        .bind(entry.destination_account_id.map(AccountId::into_uuid))
        .bind(entry.description.as_deref())
        .bind(entry.created_at)
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
        let start: DateTime<Utc> = day.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);

        let total: Decimal = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(amount_ref), 0) FROM ledger_entries
               WHERE source_account_id = $1 AND status = 'COMPLETED'
                 AND created_at >= $2 AND created_at < $3"#,
        )
        .bind(account_id.into_uuid())
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(total)
    }
}

#[async_trait]
impl RateStore for PgUnitOfWork {
    async fn latest_rate(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<Decimal>, RepoError> {
        sqlx::query_scalar(
            r#"SELECT rate FROM exchange_rates
               WHERE from_currency = $1 AND to_currency = $2 AND effective_at <= NOW()
               ORDER BY effective_at DESC, id DESC LIMIT 1"#,
        )
        .bind(from.code())
        .bind(to.code())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
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
impl AdminStore for PostgresRepo {
    async fn create_customer(&self, req: NewCustomer) -> Result<Customer, RepoError> {
        let customer =
            Customer::new(req.national_id, req.name, req.daily_limit).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO customers (id, national_id, name, status, daily_limit, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(customer.id.into_uuid())
        .bind(&customer.national_id)
        .bind(&customer.name)
        .bind(customer.status.as_str())
        .bind(customer.daily_limit)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(customer)
    }

    async fn open_account(&self, req: NewAccount) -> Result<Account, RepoError> {
        if let Some(customer_id) = req.customer_id {
            let exists: Option<uuid::Uuid> =
                sqlx::query_scalar("SELECT id FROM customers WHERE id = $1")
                    .bind(customer_id.into_uuid())
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
               VALUES ($1, $2, $3, $4, $5, TRUE, $6)"#,
        )
        .bind(account.id.into_uuid())
        .bind(account.number.as_str())
        .bind(account.customer_id.map(CustomerId::into_uuid))
        .bind(account.currency().code())
        .bind(account.balance.amount())
        .bind(account.created_at)
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
        let result = sqlx::query("UPDATE customers SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_account_active(&self, id: AccountId, active: bool) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE accounts SET is_active = $1 WHERE id = $2")
            .bind(active)
            .bind(id.into_uuid())
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
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(from.code())
        .bind(to.code())
        .bind(rate)
        .bind(effective_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_account(&self, number: &AccountNumber) -> Result<Option<Account>, RepoError> {
        let sql = format!("SELECT {} FROM accounts WHERE number = $1", ACCOUNT_COLUMNS);
        let row: Option<PgAccount> = sqlx::query_as(&sql)
            .bind(number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(PgAccount::into_domain).transpose()
    }

    async fn list_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, RepoError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries \
             WHERE source_account_id = $1 OR destination_account_id = $1 \
             ORDER BY created_at DESC",
            ENTRY_COLUMNS
        );
        let rows: Vec<PgEntry> = sqlx::query_as(&sql)
            .bind(account_id.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(PgEntry::into_domain).collect()
    }
}
