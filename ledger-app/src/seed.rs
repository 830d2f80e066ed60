//! Demo data for local runs.
//!
//! Seeding is skipped when the first demo account already exists, so a
//! persistent database is seeded once.

use anyhow::Context;
use exchange_rates::RateTable;
use rust_decimal::Decimal;
use tracing::info;

use ledger_types::{
    AccountNumber, AdminStore, CurrencyCode, CustomerStatus, NewAccount, NewCustomer,
};

/// Company account funding the demo payroll; it has no owning customer.
pub const DEMO_FUNDING_ACCOUNT: &str = "KZ00CORP000000000001";

struct DemoCustomer {
    national_id: &'static str,
    name: &'static str,
    /// In the reference currency
    daily_limit: i64,
    status: CustomerStatus,
    accounts: &'static [(&'static str, CurrencyCode, i64)],
}

const DEMO_CUSTOMERS: &[DemoCustomer] = &[
    DemoCustomer {
        national_id: "900101300111",
        name: "Aigerim Sadykova",
        daily_limit: 1_000_000,
        status: CustomerStatus::Active,
        accounts: &[
            ("KZ00DEMO000000000001", CurrencyCode::KZT, 500_000),
            ("KZ00DEMO000000000002", CurrencyCode::USD, 2_000),
        ],
    },
    DemoCustomer {
        national_id: "850505400222",
        name: "Timur Bekov",
        daily_limit: 200_000,
        status: CustomerStatus::Active,
        accounts: &[("KZ00DEMO000000000003", CurrencyCode::KZT, 0)],
    },
    DemoCustomer {
        national_id: "770707400333",
        name: "Olga Ivanova",
        daily_limit: 500_000,
        status: CustomerStatus::Blocked,
        accounts: &[("KZ00DEMO000000000004", CurrencyCode::EUR, 1_000)],
    },
];

/// Creates demo customers, accounts and development rates.
///
/// Returns `false` when the data was already there.
pub async fn seed_demo<S: AdminStore>(store: &S) -> anyhow::Result<bool> {
    let marker = AccountNumber::new(DEMO_CUSTOMERS[0].accounts[0].0)?;
    if store.get_account(&marker).await?.is_some() {
        info!("Demo data already present, skipping seed");
        return Ok(false);
    }

    for quote in RateTable::development().quotes() {
        store
            .record_rate(quote.from, quote.to, quote.rate, quote.effective_at)
            .await
            .with_context(|| format!("recording rate {} -> {}", quote.from, quote.to))?;
    }

    for demo in DEMO_CUSTOMERS {
        let customer = store
            .create_customer(NewCustomer {
                national_id: demo.national_id.to_string(),
                name: demo.name.to_string(),
                daily_limit: Decimal::from(demo.daily_limit),
            })
            .await
            .with_context(|| format!("creating customer {}", demo.national_id))?;

        for &(number, currency, balance) in demo.accounts {
            store
                .open_account(NewAccount {
                    number: AccountNumber::new(number)?,
                    customer_id: Some(customer.id),
                    currency,
                    opening_balance: Decimal::from(balance),
                })
                .await
                .with_context(|| format!("opening account {}", number))?;
        }

        if demo.status != CustomerStatus::Active {
            store.set_customer_status(customer.id, demo.status).await?;
        }
    }

    store
        .open_account(NewAccount {
            number: AccountNumber::new(DEMO_FUNDING_ACCOUNT)?,
            customer_id: None,
            currency: CurrencyCode::KZT,
            opening_balance: Decimal::from(5_000_000),
        })
        .await
        .context("opening funding account")?;

    info!(
        customers = DEMO_CUSTOMERS.len(),
        funding_account = DEMO_FUNDING_ACCOUNT,
        "Seeded demo data"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use ledger_repo::MemoryRepo;
    use rust_decimal_macros::dec;

    use super::*;

    #[tokio::test]
    async fn test_seed_creates_accounts() {
        let repo = MemoryRepo::new();
        assert!(seed_demo(&repo).await.unwrap());

        let funding = repo
            .get_account(&AccountNumber::new(DEMO_FUNDING_ACCOUNT).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(funding.customer_id.is_none());
        assert_eq!(funding.balance.amount(), dec!(5000000));

        let usd = repo
            .get_account(&AccountNumber::new("KZ00DEMO000000000002").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(usd.currency(), CurrencyCode::USD);
        assert_eq!(usd.balance.amount(), dec!(2000));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let repo = MemoryRepo::new();
        assert!(seed_demo(&repo).await.unwrap());
        assert!(!seed_demo(&repo).await.unwrap());
    }
}
