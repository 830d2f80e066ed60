//! Rate Resolver.
//!
//! Looks up the latest rate for an exact directed pair through the unit of
//! work's [`RateStore`]. A reverse-direction rate is never inverted.

use rust_decimal::Decimal;

use ledger_types::{AppError, CurrencyCode, RateStore};

/// Rate for `from -> to`. Identical currencies resolve to 1 without a lookup.
pub async fn resolve<S: RateStore>(
    store: &mut S,
    from: CurrencyCode,
    to: CurrencyCode,
) -> Result<Decimal, AppError> {
    if from == to {
        return Ok(Decimal::ONE);
    }
    store
        .latest_rate(from, to)
        .await?
        .ok_or(AppError::RateNotFound { from, to })
}

/// Converts `amount` from one currency to another, rounded to the target
/// currency's scale (midpoint away from zero).
pub async fn convert<S: RateStore>(
    store: &mut S,
    amount: Decimal,
    from: CurrencyCode,
    to: CurrencyCode,
) -> Result<Decimal, AppError> {
    if from == to {
        return Ok(amount);
    }
    let rate = resolve(store, from, to).await?;
    Ok(exchange_rates::convert(amount, rate, to))
}
