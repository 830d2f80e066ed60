//! Payroll Disburser.
//!
//! A batch runs under a named mutex keyed by the funding account number.
//! Every debit out of an account takes the same mutex, so nothing else can
//! draw on the funding balance between validation and the last payment. The
//! validation pass prices every item in the funding currency and refuses the
//! whole batch if the total exceeds the balance. The execution pass then pays
//! each item in its own unit of work: an item that cannot be resolved or that
//! faults is reported and skipped, and items already paid stay paid.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument, warn};

use ledger_types::{
    Account, AccountStore, AppError, AuditAction, CurrencyCode, CustomerStore, LedgerEntry,
    LedgerRepository, LedgerStore, Money, PayrollFailure, PayrollFailureReason, PayrollItem,
    PayrollRejection, PayrollReport, PayrollRequest, UnitOfWork,
};

use crate::rates;
use crate::service::{LedgerService, validate_amount};

/// An item as priced by the validation pass.
#[derive(Debug, Clone, Copy)]
struct PricedItem {
    currency: CurrencyCode,
    /// Debit in the funding account's currency
    debit: Decimal,
}

impl<R: LedgerRepository> LedgerService<R> {
    /// Pays a batch of salaries out of one funding account.
    #[instrument(
        skip(self, req),
        fields(funding = %req.funding_account, items = req.items.len())
    )]
    pub async fn disburse(&self, req: PayrollRequest) -> Result<PayrollReport, AppError> {
        for (index, item) in req.items.iter().enumerate() {
            if item.amount <= Decimal::ZERO {
                return Err(AppError::BadRequest(format!(
                    "Payroll item {} amount must be positive",
                    index
                )));
            }
        }

        let result = match self.locks.acquire(req.funding_account.as_str()).await {
            Ok(_guard) => self.execute_payroll(&req).await,
            Err(e) => Err(e.into()),
        };

        let details = match &result {
            Ok(report) => json!({
                "funding_account": req.funding_account,
                "items": req.items.len(),
                "paid": report.paid_count,
                "failed": report.failed_count,
                "failures": report.failures,
            }),
            // Faults surface before any item is paid
            Err(_) => json!({
                "funding_account": req.funding_account,
                "items": req.items.len(),
                "paid": 0,
            }),
        };
        let outcome = result
            .as_ref()
            .map(|report| report.error.map_or("OK", |e| e.code()));
        self.record(AuditAction::Payroll, outcome, details);
        result
    }

    async fn execute_payroll(&self, req: &PayrollRequest) -> Result<PayrollReport, AppError> {
        let mut uow = self.repo.begin().await?;

        let Some(funding) = uow.lock_account_by_number(&req.funding_account).await? else {
            return Ok(PayrollReport::rejected(PayrollRejection::NoCompanyAccount));
        };

        let mut priced = Vec::with_capacity(req.items.len());
        let mut total = Decimal::ZERO;
        for item in &req.items {
            let currency = item.currency.unwrap_or(funding.currency());
            validate_amount(item.amount, currency)?;
            let debit = rates::convert(&mut uow, item.amount, currency, funding.currency()).await?;
            total += debit;
            priced.push(PricedItem { currency, debit });
        }

        if total > funding.balance.amount() {
            debug!(%total, balance = %funding.balance, "Payroll exceeds funding balance");
            return Ok(PayrollReport::rejected(PayrollRejection::NoMoney));
        }
        // Each item locks the funding row again in its own unit. The named
        // mutex keeps other debits out until the batch is done.
        drop(uow);

        let mut paid = 0;
        let mut failures = Vec::new();
        for (index, (item, priced)) in req.items.iter().zip(&priced).enumerate() {
            let failure = match self.pay_item(&funding, item, *priced).await {
                Ok(failure) => failure,
                Err(e) => {
                    warn!(index, error = %e, "Payroll item faulted, nothing written for it");
                    Some(PayrollFailureReason::from(&e))
                }
            };

            match failure {
                None => paid += 1,
                Some(reason) => {
                    warn!(index, national_id = %item.national_id, reason = reason.code(), "Payroll item skipped");
                    failures.push(PayrollFailure {
                        index,
                        national_id: item.national_id.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(PayrollReport::executed(paid, failures))
    }

    /// Pays one item atomically. `Some(reason)` when the recipient cannot be
    /// resolved; nothing is written in that case or on `Err`.
    async fn pay_item(
        &self,
        funding: &Account,
        item: &PayrollItem,
        priced: PricedItem,
    ) -> Result<Option<PayrollFailureReason>, AppError> {
        let mut uow = self.repo.begin().await?;

        let Some(customer) = uow.find_by_national_id(&item.national_id).await? else {
            return Ok(Some(PayrollFailureReason::NotFound));
        };
        let Some(recipient) = uow.find_active_account_for_customer(customer.id).await? else {
            return Ok(Some(PayrollFailureReason::NoActiveAccount));
        };

        // Same canonical order as transfers: ascending account number.
        let (mut payer, mut payee) = if recipient.id == funding.id {
            (uow.lock_account_by_id(funding.id).await?, None)
        } else if funding.number <= recipient.number {
            let payer = uow.lock_account_by_id(funding.id).await?;
            let payee = uow.lock_account_by_id(recipient.id).await?;
            (payer, Some(payee))
        } else {
            let payee = uow.lock_account_by_id(recipient.id).await?;
            let payer = uow.lock_account_by_id(funding.id).await?;
            (payer, Some(payee))
        };

        let credit_amount =
            rates::convert(&mut uow, item.amount, priced.currency, recipient.currency()).await?;
        let amount_ref = rates::convert(&mut uow, item.amount, priced.currency, self.reference).await?;
        let credit = Money::new(credit_amount, recipient.currency())?;

        payer.debit(Money::new(priced.debit, payer.currency())?)?;
        match payee.as_mut() {
            Some(payee) => payee.credit(credit)?,
            None => payer.credit(credit)?,
        }
        uow.update_balance(payer.id, payer.balance).await?;
        if let Some(payee) = &payee {
            uow.update_balance(payee.id, payee.balance).await?;
        }

        let entry = LedgerEntry::salary(
            funding.id,
            recipient.id,
            Money::positive(item.amount, priced.currency)?,
            amount_ref,
            item.description.clone(),
        );
        uow.insert_entry(&entry).await?;
        uow.commit().await?;

        debug!(entry_id = %entry.id, recipient = %recipient.number, "Salary paid");
        Ok(None)
    }
}
