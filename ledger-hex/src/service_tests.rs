//! LedgerService unit tests against the in-memory adapter.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use exchange_rates::RateTable;
    use ledger_repo::{KeyedMutex, MemoryAuditLog, MemoryRepo};
    use ledger_types::{
        Account, AccountNumber, AccountStore, AdminStore, AppError, AuditAction, CurrencyCode,
        Customer, CustomerStatus, DepositRequest, EntryKind, EntryStatus, LedgerRepository,
        NamedMutex, NewAccount, NewCustomer, PayrollFailureReason, PayrollItem,
        PayrollRejection, PayrollRequest, TransferOutcome, TransferRequest, WithdrawRequest,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::LedgerService;

    struct Harness {
        service: LedgerService<MemoryRepo>,
        audit: Arc<MemoryAuditLog>,
        locks: Arc<KeyedMutex>,
    }

    async fn harness() -> Harness {
        let repo = MemoryRepo::with_lock_timeout(Duration::from_millis(200));
        repo.load_rates(RateTable::development()).await;
        let audit = Arc::new(MemoryAuditLog::new());
        let locks = Arc::new(KeyedMutex::new(Duration::from_millis(200)));
        let service = LedgerService::new(repo, audit.clone(), locks.clone(), CurrencyCode::KZT);
        Harness {
            service,
            audit,
            locks,
        }
    }

    fn num(s: &str) -> AccountNumber {
        AccountNumber::new(s).unwrap()
    }

    impl Harness {
        async fn customer(&self, national_id: &str, daily_limit: Decimal) -> Customer {
            self.service
                .repo()
                .create_customer(NewCustomer {
                    national_id: national_id.into(),
                    name: format!("Customer {}", national_id),
                    daily_limit,
                })
                .await
                .unwrap()
        }

        async fn account(
            &self,
            number: &str,
            owner: Option<&Customer>,
            currency: CurrencyCode,
            balance: Decimal,
        ) -> Account {
            self.service
                .repo()
                .open_account(NewAccount {
                    number: num(number),
                    customer_id: owner.map(|c| c.id),
                    currency,
                    opening_balance: balance,
                })
                .await
                .unwrap()
        }

        async fn balance(&self, number: &str) -> Decimal {
            self.service
                .repo()
                .get_account(&num(number))
                .await
                .unwrap()
                .unwrap()
                .balance
                .amount()
        }

        async fn entries(&self, account: &Account) -> Vec<ledger_types::LedgerEntry> {
            self.service
                .repo()
                .list_entries_for_account(account.id)
                .await
                .unwrap()
        }

        fn outcomes(&self) -> Vec<String> {
            self.audit.events().into_iter().map(|e| e.outcome).collect()
        }

        /// A (active owner, KZT 1,000,000, limit 500,000) and B (KZT, empty).
        async fn two_kzt_accounts(&self) -> (Account, Account) {
            let alice = self.customer("900101300111", dec!(500000)).await;
            let bob = self.customer("850505400222", dec!(500000)).await;
            let a = self
                .account("KZ-A", Some(&alice), CurrencyCode::KZT, dec!(1000000))
                .await;
            let b = self
                .account("KZ-B", Some(&bob), CurrencyCode::KZT, dec!(0))
                .await;
            (a, b)
        }
    }

    fn transfer(from: &str, to: &str, amount: Decimal, currency: CurrencyCode) -> TransferRequest {
        TransferRequest {
            from_account: num(from),
            to_account: num(to),
            amount,
            currency,
            description: None,
        }
    }

    fn item(national_id: &str, amount: Decimal, currency: Option<CurrencyCode>) -> PayrollItem {
        PayrollItem {
            national_id: national_id.into(),
            amount,
            currency,
            description: Some("October salary".into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transfers
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_same_currency_transfer_moves_exact_amount() {
        let h = harness().await;
        let (a, b) = h.two_kzt_accounts().await;

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(10000), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::Ok);
        assert_eq!(h.balance("KZ-A").await, dec!(990000));
        assert_eq!(h.balance("KZ-B").await, dec!(10000));

        let entries = h.entries(&a).await;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(Some(entry.id), resp.entry_id);
        assert_eq!(entry.kind, EntryKind::Transfer);
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(entry.source_account_id, Some(a.id));
        assert_eq!(entry.destination_account_id, Some(b.id));
        assert_eq!(entry.amount_ref, dec!(10000));
    }

    #[tokio::test]
    async fn test_missing_source_is_from_not_found() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let resp = h
            .service
            .transfer(transfer("missing-account", "KZ-B", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::FromNotFound);
        assert!(resp.entry_id.is_none());
        assert_eq!(h.balance("KZ-B").await, dec!(0));
        assert_eq!(h.outcomes(), vec!["FROM_NOT_FOUND"]);
    }

    #[tokio::test]
    async fn test_missing_destination_is_to_not_found() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-ZZZ", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::ToNotFound);
        assert_eq!(h.balance("KZ-A").await, dec!(1000000));
    }

    #[tokio::test]
    async fn test_source_missing_wins_regardless_of_lock_order() {
        let h = harness().await;

        // "ZZ" sorts after "AA", so the destination is locked first.
        let resp = h
            .service
            .transfer(transfer("ZZ-missing", "AA-missing", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::FromNotFound);
    }

    #[tokio::test]
    async fn test_inactive_owner_is_rejected() {
        let h = harness().await;
        let (a, _) = h.two_kzt_accounts().await;
        let owner = a.customer_id.unwrap();

        for status in [CustomerStatus::Blocked, CustomerStatus::Frozen] {
            h.service
                .repo()
                .set_customer_status(owner, status)
                .await
                .unwrap();
            let resp = h
                .service
                .transfer(transfer("KZ-A", "KZ-B", dec!(10), CurrencyCode::KZT))
                .await
                .unwrap();
            assert_eq!(resp.outcome, TransferOutcome::CustomerInactive);
        }
        assert_eq!(h.balance("KZ-A").await, dec!(1000000));
    }

    #[tokio::test]
    async fn test_ownerless_account_cannot_originate() {
        let h = harness().await;
        h.two_kzt_accounts().await;
        h.account("KZ-CORP", None, CurrencyCode::KZT, dec!(1000))
            .await;

        let resp = h
            .service
            .transfer(transfer("KZ-CORP", "KZ-B", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::CustomerInactive);
    }

    #[tokio::test]
    async fn test_recipient_status_is_not_checked() {
        let h = harness().await;
        let (_, b) = h.two_kzt_accounts().await;
        h.service
            .repo()
            .set_customer_status(b.customer_id.unwrap(), CustomerStatus::Blocked)
            .await
            .unwrap();

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::Ok);
        assert_eq!(h.balance("KZ-B").await, dec!(10));
    }

    #[tokio::test]
    async fn test_insufficient_same_currency_is_no_money() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(1000000.01), CurrencyCode::KZT))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::NoMoney);
        assert_eq!(h.balance("KZ-A").await, dec!(1000000));
    }

    #[tokio::test]
    async fn test_insufficient_after_conversion_is_no_money_conv() {
        let h = harness().await;
        let c = h.customer("900101300111", dec!(1000000)).await;
        h.account("KZ-A", Some(&c), CurrencyCode::KZT, dec!(5000))
            .await;
        h.account("KZ-B", None, CurrencyCode::KZT, dec!(0)).await;

        // 10 USD is 5,050 KZT at the development rate.
        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(10), CurrencyCode::USD))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::NoMoneyConv);
        assert_eq!(h.balance("KZ-A").await, dec!(5000));
    }

    #[tokio::test]
    async fn test_cross_currency_transfer_converts_both_legs() {
        let h = harness().await;
        let c = h.customer("900101300111", dec!(1000000)).await;
        let a = h
            .account("US-A", Some(&c), CurrencyCode::USD, dec!(1000))
            .await;
        h.account("KZ-B", None, CurrencyCode::KZT, dec!(0)).await;

        let resp = h
            .service
            .transfer(transfer("US-A", "KZ-B", dec!(100), CurrencyCode::USD))
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::Ok);
        assert_eq!(h.balance("US-A").await, dec!(900));
        assert_eq!(h.balance("KZ-B").await, dec!(50500));

        let entries = h.entries(&a).await;
        let entry = &entries[0];
        assert_eq!(entry.amount.currency(), CurrencyCode::USD);
        assert_eq!(entry.amount.amount(), dec!(100));
        assert_eq!(entry.amount_ref, dec!(50500));
    }

    #[tokio::test]
    async fn test_reference_currency_source_debit_equals_limit_amount() {
        let h = harness().await;
        let (a, _) = h.two_kzt_accounts().await;
        h.account("US-B", None, CurrencyCode::USD, dec!(0)).await;

        let resp = h
            .service
            .transfer(transfer("KZ-A", "US-B", dec!(100), CurrencyCode::USD))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::Ok);

        let debited = dec!(1000000) - h.balance("KZ-A").await;
        let entries = h.entries(&a).await;
        let entry = &entries[0];
        assert_eq!(debited, entry.amount_ref);
        assert_eq!(debited, dec!(50500));
        assert_eq!(h.balance("US-B").await, dec!(100));
    }

    #[tokio::test]
    async fn test_missing_rate_is_a_fault_and_changes_nothing() {
        let h = harness().await;
        let (a, _) = h.two_kzt_accounts().await;
        h.account("GB-C", None, CurrencyCode::GBP, dec!(0)).await;

        // No GBP quotes exist in either direction.
        let err = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(10), CurrencyCode::GBP))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::RateNotFound {
                from: CurrencyCode::GBP,
                to: CurrencyCode::KZT
            }
        ));

        // Debit side clears; the credit leg has no KZT -> GBP rate.
        let err = h
            .service
            .transfer(transfer("KZ-A", "GB-C", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateNotFound { .. }));

        assert_eq!(h.balance("KZ-A").await, dec!(1000000));
        assert_eq!(h.balance("GB-C").await, dec!(0));
        assert!(h.entries(&a).await.is_empty());
        assert_eq!(h.outcomes(), vec!["RATE_NOT_FOUND", "RATE_NOT_FOUND"]);
    }

    #[tokio::test]
    async fn test_daily_limit_boundary() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let ok = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(200000), CurrencyCode::KZT))
            .await
            .unwrap();
        assert_eq!(ok.outcome, TransferOutcome::Ok);

        // Exactly the remaining 300,000 is allowed.
        let ok = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(300000), CurrencyCode::KZT))
            .await
            .unwrap();
        assert_eq!(ok.outcome, TransferOutcome::Ok);

        let over = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(0.01), CurrencyCode::KZT))
            .await
            .unwrap();
        assert_eq!(over.outcome, TransferOutcome::LimitExceeded);
        assert_eq!(h.balance("KZ-A").await, dec!(500000));
        assert_eq!(h.balance("KZ-B").await, dec!(500000));
    }

    #[tokio::test]
    async fn test_limit_is_checked_in_reference_currency() {
        let h = harness().await;
        let c = h.customer("900101300111", dec!(50000)).await;
        h.account("US-A", Some(&c), CurrencyCode::USD, dec!(1000))
            .await;
        h.account("US-B", None, CurrencyCode::USD, dec!(0)).await;

        // 100 USD = 50,500 KZT > 50,000 KZT limit.
        let resp = h
            .service
            .transfer(transfer("US-A", "US-B", dec!(100), CurrencyCode::USD))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::LimitExceeded);

        let resp = h
            .service
            .transfer(transfer("US-A", "US-B", dec!(99), CurrencyCode::USD))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::Ok);
    }

    #[tokio::test]
    async fn test_rejected_attempts_do_not_consume_limit() {
        let h = harness().await;
        let c = h.customer("900101300111", dec!(1000)).await;
        h.account("KZ-A", Some(&c), CurrencyCode::KZT, dec!(500))
            .await;
        h.account("KZ-B", None, CurrencyCode::KZT, dec!(0)).await;

        for _ in 0..3 {
            let resp = h
                .service
                .transfer(transfer("KZ-A", "KZ-B", dec!(900), CurrencyCode::KZT))
                .await
                .unwrap();
            assert_eq!(resp.outcome, TransferOutcome::NoMoney);
        }

        h.service
            .deposit(DepositRequest {
                account: num("KZ-A"),
                amount: dec!(500),
                currency: CurrencyCode::KZT,
                description: None,
            })
            .await
            .unwrap();

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(1000), CurrencyCode::KZT))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::Ok);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_bad_requests() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        for req in [
            transfer("KZ-A", "KZ-B", dec!(0), CurrencyCode::KZT),
            transfer("KZ-A", "KZ-B", dec!(-5), CurrencyCode::KZT),
            transfer("KZ-A", "KZ-B", dec!(1.001), CurrencyCode::KZT),
            transfer("KZ-A", "KZ-A", dec!(10), CurrencyCode::KZT),
        ] {
            let err = h.service.transfer(req).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
        assert!(h.audit.events().is_empty());
    }

    #[tokio::test]
    async fn test_row_lock_timeout_surfaces_as_fault() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let mut holder = h.service.repo().begin().await.unwrap();
        holder.lock_account_by_number(&num("KZ-B")).await.unwrap();

        let err = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::LockTimeout));
        drop(holder);
        assert_eq!(h.balance("KZ-A").await, dec!(1000000));
        assert_eq!(h.outcomes(), vec!["LOCK_TIMEOUT"]);
    }

    #[tokio::test]
    async fn test_audit_event_carries_entry_id() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(10), CurrencyCode::KZT))
            .await
            .unwrap();

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::Transfer);
        assert_eq!(events[0].outcome, "OK");
        assert_eq!(
            events[0].details["entry_id"],
            serde_json::json!(resp.entry_id.unwrap())
        );
    }

    #[tokio::test]
    async fn test_amount_below_one_minor_unit_after_conversion_is_bad_request() {
        let h = harness().await;
        h.two_kzt_accounts().await;
        let c = h.customer("770707300777", dec!(1000000)).await;
        h.account("US-C", Some(&c), CurrencyCode::USD, dec!(50)).await;

        // 0.01 KZT is 0.0000196 USD, which rounds to 0.00
        let err = h
            .service
            .transfer(transfer("KZ-A", "US-C", dec!(0.01), CurrencyCode::KZT))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = h
            .service
            .withdraw(WithdrawRequest {
                account: num("US-C"),
                amount: dec!(0.01),
                currency: CurrencyCode::KZT,
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = h
            .service
            .deposit(DepositRequest {
                account: num("US-C"),
                amount: dec!(0.01),
                currency: CurrencyCode::KZT,
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(h.balance("KZ-A").await, dec!(1000000));
        assert_eq!(h.balance("US-C").await, dec!(50));
        assert!(h.audit.events().is_empty());

        // The same amount in the account's own currency still goes through
        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(0.01), CurrencyCode::KZT))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::Ok);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Deposits and withdrawals
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_deposit_credits_converted_amount() {
        let h = harness().await;
        let (_, b) = h.two_kzt_accounts().await;

        let resp = h
            .service
            .deposit(DepositRequest {
                account: num("KZ-B"),
                amount: dec!(20),
                currency: CurrencyCode::EUR,
                description: Some("cash-in".into()),
            })
            .await
            .unwrap();

        assert_eq!(resp.outcome, TransferOutcome::Ok);
        assert_eq!(h.balance("KZ-B").await, dec!(10970));

        let entries = h.entries(&b).await;
        let entry = &entries[0];
        assert_eq!(entry.kind, EntryKind::Deposit);
        assert!(entry.source_account_id.is_none());
        assert_eq!(entry.destination_account_id, Some(b.id));
    }

    #[tokio::test]
    async fn test_deposit_to_missing_account() {
        let h = harness().await;
        let resp = h
            .service
            .deposit(DepositRequest {
                account: num("nope"),
                amount: dec!(20),
                currency: CurrencyCode::KZT,
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::ToNotFound);
    }

    #[tokio::test]
    async fn test_withdrawal_debits_and_counts_toward_limit() {
        let h = harness().await;
        let (a, _) = h.two_kzt_accounts().await;

        let resp = h
            .service
            .withdraw(WithdrawRequest {
                account: num("KZ-A"),
                amount: dec!(450000),
                currency: CurrencyCode::KZT,
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::Ok);
        assert_eq!(h.balance("KZ-A").await, dec!(550000));

        let entries = h.entries(&a).await;
        let entry = &entries[0];
        assert_eq!(entry.kind, EntryKind::Withdrawal);
        assert!(entry.destination_account_id.is_none());

        let resp = h
            .service
            .transfer(transfer("KZ-A", "KZ-B", dec!(50000.01), CurrencyCode::KZT))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::LimitExceeded);
    }

    #[tokio::test]
    async fn test_withdrawal_preflight_ladder() {
        let h = harness().await;
        h.two_kzt_accounts().await;

        let withdraw = |account: &str, amount: Decimal| WithdrawRequest {
            account: num(account),
            amount,
            currency: CurrencyCode::KZT,
            description: None,
        };

        let resp = h.service.withdraw(withdraw("nope", dec!(1))).await.unwrap();
        assert_eq!(resp.outcome, TransferOutcome::FromNotFound);

        let resp = h
            .service
            .withdraw(withdraw("KZ-B", dec!(1)))
            .await
            .unwrap();
        assert_eq!(resp.outcome, TransferOutcome::NoMoney);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payroll
    // ─────────────────────────────────────────────────────────────────────────

    /// Company account KZ-CORP plus three employees with one account each:
    /// KZT, USD and KZT.
    async fn payroll_fixture(h: &Harness, funding_balance: Decimal) -> Account {
        let funding = h
            .account("KZ-CORP", None, CurrencyCode::KZT, funding_balance)
            .await;
        for (nid, number, currency) in [
            ("010101500001", "KZ-E1", CurrencyCode::KZT),
            ("010101500002", "US-E2", CurrencyCode::USD),
            ("010101500003", "KZ-E3", CurrencyCode::KZT),
        ] {
            let c = h.customer(nid, dec!(0)).await;
            h.account(number, Some(&c), currency, dec!(0)).await;
        }
        funding
    }

    #[tokio::test]
    async fn test_payroll_pays_resolvable_and_reports_the_rest() {
        let h = harness().await;
        let funding = payroll_fixture(&h, dec!(1000000)).await;

        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![
                    item("010101500001", dec!(150000), None),
                    item("010101500002", dec!(200000), None),
                    item("010101500003", dec!(100), Some(CurrencyCode::USD)),
                    item("999999999999", dec!(50000), None),
                ],
            })
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.paid_count, 3);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.failures[0].index, 3);
        assert_eq!(report.failures[0].reason, PayrollFailureReason::NotFound);

        // 150,000 + 200,000 + 100 USD (50,500 KZT)
        assert_eq!(h.balance("KZ-CORP").await, dec!(1000000) - dec!(400500));
        assert_eq!(h.balance("KZ-E1").await, dec!(150000));
        assert_eq!(h.balance("US-E2").await, dec!(392.00));
        assert_eq!(h.balance("KZ-E3").await, dec!(50500));

        let entries = h.entries(&funding).await;
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.kind == EntryKind::Salary));
        assert!(
            entries
                .iter()
                .all(|e| e.status == EntryStatus::Completed)
        );
        assert_eq!(h.outcomes(), vec!["OK"]);
    }

    #[tokio::test]
    async fn test_payroll_over_balance_touches_nothing() {
        let h = harness().await;
        let funding = payroll_fixture(&h, dec!(100000)).await;

        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![
                    item("010101500001", dec!(60000), None),
                    item("010101500003", dec!(50000), None),
                ],
            })
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.error, Some(PayrollRejection::NoMoney));
        assert_eq!(report.paid_count, 0);
        assert_eq!(h.balance("KZ-CORP").await, dec!(100000));
        assert_eq!(h.balance("KZ-E1").await, dec!(0));
        assert!(h.entries(&funding).await.is_empty());
        assert_eq!(h.outcomes(), vec!["NO_MONEY"]);
        assert_eq!(h.locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_payroll_without_funding_account() {
        let h = harness().await;

        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![item("010101500001", dec!(1), None)],
            })
            .await
            .unwrap();

        assert_eq!(report.error, Some(PayrollRejection::NoCompanyAccount));
        assert_eq!(h.locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_payroll_skips_recipient_without_active_account() {
        let h = harness().await;
        payroll_fixture(&h, dec!(1000)).await;
        let e1 = h
            .service
            .repo()
            .get_account(&num("KZ-E1"))
            .await
            .unwrap()
            .unwrap();
        h.service
            .repo()
            .set_account_active(e1.id, false)
            .await
            .unwrap();

        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![
                    item("010101500001", dec!(100), None),
                    item("010101500003", dec!(200), None),
                ],
            })
            .await
            .unwrap();

        assert_eq!(report.paid_count, 1);
        assert_eq!(
            report.failures[0].reason,
            PayrollFailureReason::NoActiveAccount
        );
        assert_eq!(h.balance("KZ-CORP").await, dec!(800));
        assert_eq!(h.balance("KZ-E1").await, dec!(0));
    }

    #[tokio::test]
    async fn test_empty_payroll_succeeds() {
        let h = harness().await;
        payroll_fixture(&h, dec!(0)).await;

        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![],
            })
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.paid_count, 0);
        assert_eq!(report.failed_count, 0);
    }

    #[tokio::test]
    async fn test_payroll_missing_rate_aborts_before_paying() {
        let h = harness().await;
        payroll_fixture(&h, dec!(1000000)).await;

        let err = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![
                    item("010101500001", dec!(100), None),
                    item("010101500003", dec!(100), Some(CurrencyCode::GBP)),
                ],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RateNotFound { .. }));
        assert_eq!(h.balance("KZ-CORP").await, dec!(1000000));
        assert_eq!(h.balance("KZ-E1").await, dec!(0));
        assert_eq!(h.outcomes(), vec!["RATE_NOT_FOUND"]);
    }

    #[tokio::test]
    async fn test_payroll_item_fault_is_reported_and_batch_continues() {
        let h = harness().await;
        let funding = payroll_fixture(&h, dec!(1000)).await;
        let c = h.customer("010101500004", dec!(0)).await;
        h.account("GB-E4", Some(&c), CurrencyCode::GBP, dec!(0)).await;

        // Priced in KZT, so validation clears; the KZT -> GBP credit leg has no rate.
        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![
                    item("010101500001", dec!(100), None),
                    item("010101500004", dec!(100), None),
                    item("010101500003", dec!(100), None),
                ],
            })
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.paid_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].national_id, "010101500004");
        assert_eq!(
            report.failures[0].reason,
            PayrollFailureReason::RateNotFound
        );

        assert_eq!(h.balance("KZ-CORP").await, dec!(800));
        assert_eq!(h.balance("KZ-E1").await, dec!(100));
        assert_eq!(h.balance("GB-E4").await, dec!(0));
        assert_eq!(h.balance("KZ-E3").await, dec!(100));
        assert_eq!(h.entries(&funding).await.len(), 2);

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, "OK");
        assert_eq!(events[0].details["paid"], 2);
        assert_eq!(events[0].details["failures"][0]["reason"], "RATE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_payroll_rejects_non_positive_items() {
        let h = harness().await;
        payroll_fixture(&h, dec!(1000)).await;

        let err = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![item("010101500001", dec!(0), None)],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_payroll_waits_for_named_mutex() {
        let h = harness().await;
        payroll_fixture(&h, dec!(1000)).await;

        let held = h.locks.acquire("KZ-CORP").await.unwrap();
        let err = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![item("010101500001", dec!(100), None)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LockTimeout));

        drop(held);
        let report = h
            .service
            .disburse(PayrollRequest {
                funding_account: num("KZ-CORP"),
                items: vec![item("010101500001", dec!(100), None)],
            })
            .await
            .unwrap();
        assert_eq!(report.paid_count, 1);
    }
}
