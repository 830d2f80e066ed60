//! Currency catalogue and directed exchange-rate table.
//!
//! Currencies are declared once with the `define_currencies!` macro, which
//! generates the [`CurrencyCode`] enum together with its metadata lookups,
//! parsing and display.
//!
//! Rates are *directed*: a quote for `USD -> KZT` says nothing about
//! `KZT -> USD`. [`RateTable`] keeps every quote it is given and answers with
//! the most recently effective one for the exact pair, never with an inverse.
//!
//! # Example
//! ```
//! use chrono::Utc;
//! use exchange_rates::{CurrencyCode, RateTable, convert};
//! use rust_decimal::Decimal;
//!
//! let mut table = RateTable::new();
//! table.insert(CurrencyCode::USD, CurrencyCode::KZT, Decimal::new(50500, 2), Utc::now());
//!
//! let rate = table.latest(CurrencyCode::USD, CurrencyCode::KZT).unwrap();
//! let tenge = convert(Decimal::new(1000, 2), rate, CurrencyCode::KZT);
//! assert_eq!(tenge, Decimal::new(505000, 2));
//! assert!(table.latest(CurrencyCode::KZT, CurrencyCode::USD).is_none());
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Error returned when a currency code is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown currency: {0}")]
pub struct UnknownCurrency(pub String);

// ─────────────────────────────────────────────────────────────────────────────
// THE MACRO: Defines the CurrencyCode enum and its metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Macro to define currencies with auto-generated metadata lookups.
///
/// # Syntax
/// ```ignore
/// define_currencies! {
///     Name => ("CODE", "SYMBOL", "minor_unit", decimal_places),
/// }
/// ```
#[macro_export]
macro_rules! define_currencies {
    (
        $(
            $name:ident => ($code:literal, $symbol:literal, $minor:literal, $decimals:expr)
        ),* $(,)?
    ) => {
        /// ISO 4217 currency supported by the ledger.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum CurrencyCode {
            $($name),*
        }

        impl CurrencyCode {
            pub fn code(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $code),*
                }
            }

            pub fn symbol(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $symbol),*
                }
            }

            pub fn minor_unit(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $minor),*
                }
            }

            /// Number of decimal places amounts in this currency are kept at.
            pub fn decimal_places(&self) -> u32 {
                match self {
                    $(CurrencyCode::$name => $decimals),*
                }
            }

            pub fn all() -> &'static [CurrencyCode] {
                &[$(CurrencyCode::$name),*]
            }
        }

        impl std::fmt::Display for CurrencyCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.code())
            }
        }

        impl std::str::FromStr for CurrencyCode {
            type Err = $crate::UnknownCurrency;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($code => Ok(CurrencyCode::$name),)*
                    _ => Err($crate::UnknownCurrency(s.to_string())),
                }
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// CURRENCY DEFINITIONS - Add new currencies here!
// ─────────────────────────────────────────────────────────────────────────────

define_currencies! {
    KZT => ("KZT", "₸", "tiyn", 2),
    USD => ("USD", "$", "cent", 2),
    EUR => ("EUR", "€", "cent", 2),
    RUB => ("RUB", "₽", "kopeck", 2),
    GBP => ("GBP", "£", "penny", 2),
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Rounds an amount to the scale of `currency`, midpoint away from zero.
pub fn round_to(amount: Decimal, currency: CurrencyCode) -> Decimal {
    amount.round_dp_with_strategy(
        currency.decimal_places(),
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Applies `rate` to `amount` and rounds the result to the target currency.
pub fn convert(amount: Decimal, rate: Decimal, to: CurrencyCode) -> Decimal {
    round_to(amount * rate, to)
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate table
// ─────────────────────────────────────────────────────────────────────────────

/// One stored quote for a directed currency pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    /// Units of `to` received for one unit of `from`.
    pub rate: Decimal,
    pub effective_at: DateTime<Utc>,
}

/// In-memory store of directed rate quotes.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    quotes: Vec<RateQuote>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a quote. Older quotes for the pair are kept but shadowed.
    pub fn insert(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        effective_at: DateTime<Utc>,
    ) {
        self.quotes.push(RateQuote {
            from,
            to,
            rate,
            effective_at,
        });
    }

    /// Most recently effective rate for the exact directed pair, as of now.
    pub fn latest(&self, from: CurrencyCode, to: CurrencyCode) -> Option<Decimal> {
        self.latest_at(from, to, Utc::now())
    }

    /// Rate in effect at `at` for the exact directed pair. Quotes dated after
    /// `at` are ignored; equal effective times resolve to the one inserted last.
    pub fn latest_at(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        at: DateTime<Utc>,
    ) -> Option<Decimal> {
        self.quotes
            .iter()
            .filter(|q| q.from == from && q.to == to && q.effective_at <= at)
            .fold(None::<&RateQuote>, |best, q| match best {
                Some(b) if b.effective_at > q.effective_at => Some(b),
                _ => Some(q),
            })
            .map(|q| q.rate)
    }

    pub fn quotes(&self) -> &[RateQuote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Hardcoded development quotes. Both directions are listed explicitly and
    /// carry a spread, so they are not reciprocals of each other. GBP has no
    /// quotes at all.
    pub fn development() -> Self {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        let mut table = Self::new();
        for (from, to, rate) in [
            (CurrencyCode::USD, CurrencyCode::KZT, Decimal::new(50500, 2)),
            (CurrencyCode::KZT, CurrencyCode::USD, Decimal::new(196, 5)),
            (CurrencyCode::EUR, CurrencyCode::KZT, Decimal::new(54850, 2)),
            (CurrencyCode::KZT, CurrencyCode::EUR, Decimal::new(180, 5)),
            (CurrencyCode::RUB, CurrencyCode::KZT, Decimal::new(545, 2)),
            (CurrencyCode::KZT, CurrencyCode::RUB, Decimal::new(1820, 4)),
            (CurrencyCode::USD, CurrencyCode::EUR, Decimal::new(92, 2)),
            (CurrencyCode::EUR, CurrencyCode::USD, Decimal::new(108, 2)),
        ] {
            table.insert(from, to, rate, at);
        }
        table
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
