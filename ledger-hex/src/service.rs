//! Ledger Application Service
//!
//! Facade over the engines. The money-movement operations live next to their
//! engines (`transfer.rs`, `payroll.rs`); this module holds the shared state
//! and the helpers they use.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use ledger_types::{
    AccountNumber, AccountStore, AppError, AuditAction, AuditEmitter, AuditEvent, CurrencyCode,
    LedgerRepository, NamedMutex,
};

use crate::rates;

/// Application service for ledger operations.
///
/// Generic over `R: LedgerRepository`; every operation opens its own units of
/// work through it. Audit emission and the per-account debit mutex are
/// injected as trait objects so the binary can choose them at runtime.
pub struct LedgerService<R: LedgerRepository> {
    pub(crate) repo: R,
    pub(crate) audit: Arc<dyn AuditEmitter>,
    pub(crate) locks: Arc<dyn NamedMutex>,
    pub(crate) reference: CurrencyCode,
}

impl<R: LedgerRepository> LedgerService<R> {
    pub fn new(
        repo: R,
        audit: Arc<dyn AuditEmitter>,
        locks: Arc<dyn NamedMutex>,
        reference: CurrencyCode,
    ) -> Self {
        Self {
            repo,
            audit,
            locks,
            reference,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Currency daily limits and `amount_ref` are expressed in.
    pub fn reference_currency(&self) -> CurrencyCode {
        self.reference
    }

    /// Logs the result of an operation and hands it to the audit emitter.
    ///
    /// `outcome` is `Ok(code)` for business outcomes and `Err` for faults.
    pub(crate) fn record(
        &self,
        action: AuditAction,
        outcome: Result<&'static str, &AppError>,
        details: serde_json::Value,
    ) {
        let code = match outcome {
            Ok("OK") => {
                info!(?action, %details, "Operation committed");
                "OK"
            }
            Ok(code) => {
                warn!(?action, outcome = code, %details, "Operation rejected");
                code
            }
            Err(e) => {
                error!(?action, error = %e, %details, "Operation failed");
                e.code()
            }
        };
        self.audit.emit(AuditEvent::new(action, code, details));
    }

    /// Refuses `amount` when it converts to zero in the account's currency.
    /// Runs before any lock is taken and is not audited. Lookup faults are
    /// left for the engine to hit again and record.
    pub(crate) async fn ensure_representable(
        &self,
        account: &AccountNumber,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<(), AppError> {
        let (converted, target) = match self.converted_into(account, amount, currency).await {
            Ok(Some(pair)) => pair,
            Ok(None) => return Ok(()),
            Err(e) => {
                debug!(%account, error = %e, "Representability check skipped");
                return Ok(());
            }
        };
        if converted > Decimal::ZERO {
            return Ok(());
        }
        Err(AppError::BadRequest(format!(
            "{} {} is less than one minor unit of {} in account {}",
            amount, currency, target, account
        )))
    }

    /// `amount` in the account's currency, `None` when the account is missing
    /// or already holds `currency`.
    async fn converted_into(
        &self,
        account: &AccountNumber,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<Option<(Decimal, CurrencyCode)>, AppError> {
        let mut uow = self.repo.begin().await?;
        let Some(found) = uow.find_account_by_number(account).await? else {
            return Ok(None);
        };
        let target = found.currency();
        if target == currency {
            return Ok(None);
        }
        let converted = rates::convert(&mut uow, amount, currency, target).await?;
        Ok(Some((converted, target)))
    }
}

/// Amounts must be positive and fit the currency's minor-unit scale.
pub(crate) fn validate_amount(amount: Decimal, currency: CurrencyCode) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("Amount must be positive".into()));
    }
    if amount.normalize().scale() > currency.decimal_places() {
        return Err(AppError::BadRequest(format!(
            "Amount {} has more decimal places than {} allows",
            amount, currency
        )));
    }
    Ok(())
}
