//! Limit Tracker.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use ledger_types::{AccountId, AppError, LedgerStore};

/// The current calendar day. Days are UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Reference-currency total of today's completed entries sourced from the
/// account. Rejected attempts never produce entries, so they never count.
pub async fn spent_today<S: LedgerStore>(
    store: &mut S,
    account_id: AccountId,
) -> Result<Decimal, AppError> {
    Ok(store
        .sum_completed_today_by_source(account_id, today())
        .await?)
}

/// Whether spending `amount_ref` more today would stay within `daily_limit`.
pub fn within_limit(spent: Decimal, amount_ref: Decimal, daily_limit: Decimal) -> bool {
    spent + amount_ref <= daily_limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exact_remaining_is_allowed() {
        assert!(within_limit(dec!(400), dec!(600), dec!(1000)));
        assert!(!within_limit(dec!(400), dec!(600.01), dec!(1000)));
    }

    #[test]
    fn test_zero_limit_blocks_everything() {
        assert!(!within_limit(Decimal::ZERO, dec!(0.01), Decimal::ZERO));
    }
}
