//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use ledger_types::CurrencyCode;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Currency daily limits and cross-currency totals are measured in
    pub reference_currency: CurrencyCode,
    /// Bound on row-lock waits and on the payroll mutex
    pub lock_timeout: Duration,
    /// HTTP audit sink; audit events go to the log when unset
    pub audit_sink_url: Option<String>,
    pub audit_max_attempts: u32,
    pub seed_demo: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()?;

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let reference_currency = var("LEDGER_REFERENCE_CURRENCY")
            .unwrap_or_else(|| "KZT".to_string())
            .parse()?;

        let lock_timeout_ms: u64 = var("LEDGER_LOCK_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".to_string())
            .parse()?;
        if lock_timeout_ms == 0 {
            anyhow::bail!("LEDGER_LOCK_TIMEOUT_MS must be greater than zero");
        }

        let audit_sink_url = var("LEDGER_AUDIT_SINK_URL").filter(|url| !url.trim().is_empty());

        let audit_max_attempts = var("LEDGER_AUDIT_MAX_ATTEMPTS")
            .unwrap_or_else(|| "3".to_string())
            .parse()?;

        let seed_demo = match var("LEDGER_SEED_DEMO") {
            Some(v) => parse_flag(&v)?,
            None => false,
        };

        Ok(Self {
            port,
            database_url,
            reference_currency,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            audit_sink_url,
            audit_max_attempts,
            seed_demo,
        })
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("Invalid boolean flag: {}", other),
    }
}
