//! Transfer Engine.
//!
//! Point-to-point transfers plus the single-account deposit and withdrawal
//! movements. Each call runs in one unit of work: pre-flight checks, balance
//! mutation and the ledger entry commit together or not at all. The audit
//! event is recorded once the unit of work has been committed or abandoned.
//!
//! Debits take the named mutex of the source account before any row lock,
//! the same one a payroll batch holds for its funding account.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument};

use ledger_types::{
    Account, AccountNumber, AccountStore, AppError, AuditAction, CurrencyCode, CustomerStore,
    DepositRequest, LedgerEntry, LedgerRepository, LedgerStore, Money, MovementResponse,
    TransferOutcome, TransferRequest, UnitOfWork, WithdrawRequest,
};

use crate::service::{LedgerService, validate_amount};
use crate::{limits, rates};

/// Result of the source-side checks shared by transfers and withdrawals.
enum Preflight {
    Cleared {
        /// Debit in the source account's currency
        debit: Money,
        /// Stated amount in the reference currency
        amount_ref: Decimal,
    },
    Rejected(TransferOutcome),
}

/// Locks two accounts in ascending account-number order and hands them back
/// as `(from, to)`.
async fn lock_pair<U: AccountStore>(
    uow: &mut U,
    from: &AccountNumber,
    to: &AccountNumber,
) -> Result<(Option<Account>, Option<Account>), AppError> {
    if from <= to {
        let first = uow.lock_account_by_number(from).await?;
        let second = uow.lock_account_by_number(to).await?;
        Ok((first, second))
    } else {
        let first = uow.lock_account_by_number(to).await?;
        let second = uow.lock_account_by_number(from).await?;
        Ok((second, first))
    }
}

fn outcome_code(result: &Result<MovementResponse, AppError>) -> Result<&'static str, &AppError> {
    result.as_ref().map(|r| r.outcome.code())
}

impl<R: LedgerRepository> LedgerService<R> {
    /// Moves `amount` of `currency` from one account to another.
    #[instrument(
        skip(self, req),
        fields(from = %req.from_account, to = %req.to_account, amount = %req.amount, currency = %req.currency)
    )]
    pub async fn transfer(&self, req: TransferRequest) -> Result<MovementResponse, AppError> {
        validate_amount(req.amount, req.currency)?;
        if req.from_account == req.to_account {
            return Err(AppError::BadRequest(
                "Cannot transfer to the same account".into(),
            ));
        }

        self.ensure_representable(&req.from_account, req.amount, req.currency)
            .await?;
        self.ensure_representable(&req.to_account, req.amount, req.currency)
            .await?;

        let result = match self.locks.acquire(req.from_account.as_str()).await {
            Ok(_guard) => self.execute_transfer(&req).await,
            Err(e) => Err(e.into()),
        };

        let mut details = json!({
            "from": req.from_account,
            "to": req.to_account,
            "amount": req.amount,
            "currency": req.currency,
        });
        if let Ok(MovementResponse {
            entry_id: Some(id), ..
        }) = &result
        {
            details["entry_id"] = json!(id);
        }
        self.record(AuditAction::Transfer, outcome_code(&result), details);
        result
    }

    async fn execute_transfer(&self, req: &TransferRequest) -> Result<MovementResponse, AppError> {
        let mut uow = self.repo.begin().await?;

        let (from, to) = lock_pair(&mut uow, &req.from_account, &req.to_account).await?;
        let Some(mut from) = from else {
            return Ok(MovementResponse::rejected(TransferOutcome::FromNotFound));
        };
        let Some(mut to) = to else {
            return Ok(MovementResponse::rejected(TransferOutcome::ToNotFound));
        };

        let (debit, amount_ref) =
            match self.preflight(&mut uow, &from, req.amount, req.currency).await? {
                Preflight::Cleared { debit, amount_ref } => (debit, amount_ref),
                Preflight::Rejected(outcome) => return Ok(MovementResponse::rejected(outcome)),
            };

        let credit_amount = rates::convert(&mut uow, req.amount, req.currency, to.currency()).await?;
        let credit = Money::new(credit_amount, to.currency())?;

        from.debit(debit)?;
        to.credit(credit)?;
        uow.update_balance(from.id, from.balance).await?;
        uow.update_balance(to.id, to.balance).await?;

        let entry = LedgerEntry::transfer(
            from.id,
            to.id,
            Money::positive(req.amount, req.currency)?,
            amount_ref,
            req.description.clone(),
        );
        uow.insert_entry(&entry).await?;
        uow.commit().await?;

        debug!(entry_id = %entry.id, %debit, %credit, %amount_ref, "Transfer applied");
        Ok(MovementResponse::ok(entry.id))
    }

    /// Credits an account from outside the ledger.
    #[instrument(
        skip(self, req),
        fields(account = %req.account, amount = %req.amount, currency = %req.currency)
    )]
    pub async fn deposit(&self, req: DepositRequest) -> Result<MovementResponse, AppError> {
        validate_amount(req.amount, req.currency)?;

        self.ensure_representable(&req.account, req.amount, req.currency)
            .await?;

        let result = self.execute_deposit(&req).await;

        let details = json!({
            "account": req.account,
            "amount": req.amount,
            "currency": req.currency,
            "entry_id": result.as_ref().ok().and_then(|r| r.entry_id),
        });
        self.record(AuditAction::Deposit, outcome_code(&result), details);
        result
    }

    async fn execute_deposit(&self, req: &DepositRequest) -> Result<MovementResponse, AppError> {
        let mut uow = self.repo.begin().await?;

        let Some(mut account) = uow.lock_account_by_number(&req.account).await? else {
            return Ok(MovementResponse::rejected(TransferOutcome::ToNotFound));
        };

        let credit_amount =
            rates::convert(&mut uow, req.amount, req.currency, account.currency()).await?;
        let amount_ref = rates::convert(&mut uow, req.amount, req.currency, self.reference).await?;

        account.credit(Money::new(credit_amount, account.currency())?)?;
        uow.update_balance(account.id, account.balance).await?;

        let entry = LedgerEntry::deposit(
            account.id,
            Money::positive(req.amount, req.currency)?,
            amount_ref,
            req.description.clone(),
        );
        uow.insert_entry(&entry).await?;
        uow.commit().await?;

        Ok(MovementResponse::ok(entry.id))
    }

    /// Pays out of an account to outside the ledger. Counts toward the
    /// owner's daily limit.
    #[instrument(
        skip(self, req),
        fields(account = %req.account, amount = %req.amount, currency = %req.currency)
    )]
    pub async fn withdraw(&self, req: WithdrawRequest) -> Result<MovementResponse, AppError> {
        validate_amount(req.amount, req.currency)?;

        self.ensure_representable(&req.account, req.amount, req.currency)
            .await?;

        let result = match self.locks.acquire(req.account.as_str()).await {
            Ok(_guard) => self.execute_withdraw(&req).await,
            Err(e) => Err(e.into()),
        };

        let details = json!({
            "account": req.account,
            "amount": req.amount,
            "currency": req.currency,
            "entry_id": result.as_ref().ok().and_then(|r| r.entry_id),
        });
        self.record(AuditAction::Withdrawal, outcome_code(&result), details);
        result
    }

    async fn execute_withdraw(&self, req: &WithdrawRequest) -> Result<MovementResponse, AppError> {
        let mut uow = self.repo.begin().await?;

        let Some(mut account) = uow.lock_account_by_number(&req.account).await? else {
            return Ok(MovementResponse::rejected(TransferOutcome::FromNotFound));
        };

        let (debit, amount_ref) =
            match self.preflight(&mut uow, &account, req.amount, req.currency).await? {
                Preflight::Cleared { debit, amount_ref } => (debit, amount_ref),
                Preflight::Rejected(outcome) => return Ok(MovementResponse::rejected(outcome)),
            };

        account.debit(debit)?;
        uow.update_balance(account.id, account.balance).await?;

        let entry = LedgerEntry::withdrawal(
            account.id,
            Money::positive(req.amount, req.currency)?,
            amount_ref,
            req.description.clone(),
        );
        uow.insert_entry(&entry).await?;
        uow.commit().await?;

        Ok(MovementResponse::ok(entry.id))
    }

    /// Owner status, funds and daily limit for a debit from `source`, in
    /// that order.
    async fn preflight(
        &self,
        uow: &mut R::Uow,
        source: &Account,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<Preflight, AppError> {
        // An account without an owner cannot originate spending.
        let owner = match source.customer_id {
            Some(id) => Some(uow.find_customer(id).await?),
            None => None,
        };
        let Some(owner) = owner.filter(|c| c.is_active()) else {
            return Ok(Preflight::Rejected(TransferOutcome::CustomerInactive));
        };

        let debit_amount = rates::convert(uow, amount, currency, source.currency()).await?;
        let debit = Money::positive(debit_amount, source.currency())?;
        if !source.has_sufficient_funds(&debit) {
            let outcome = if currency == source.currency() {
                TransferOutcome::NoMoney
            } else {
                TransferOutcome::NoMoneyConv
            };
            return Ok(Preflight::Rejected(outcome));
        }

        let amount_ref = rates::convert(uow, amount, currency, self.reference).await?;
        let spent = limits::spent_today(uow, source.id).await?;
        if !limits::within_limit(spent, amount_ref, owner.daily_limit) {
            debug!(%spent, %amount_ref, limit = %owner.daily_limit, "Daily limit reached");
            return Ok(Preflight::Rejected(TransferOutcome::LimitExceeded));
        }

        Ok(Preflight::Cleared { debit, amount_ref })
    }
}
