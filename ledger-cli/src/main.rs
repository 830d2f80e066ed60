//! Ledger CLI
//!
//! Command-line interface for the Ledger API.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ledger_client::LedgerClient;
use ledger_types::{AccountNumber, CurrencyCode, Decimal, PayrollItem};

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author, version, about = "Ledger API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Ledger API
    #[arg(long, env = "LEDGER_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer funds between accounts
    Transfer {
        #[arg(long)]
        from: AccountNumber,
        #[arg(long)]
        to: AccountNumber,
        #[arg(long)]
        amount: Decimal,
        /// Currency of the amount (KZT, USD, EUR, RUB, GBP)
        #[arg(long, default_value = "KZT")]
        currency: CurrencyCode,
        #[arg(long)]
        description: Option<String>,
    },
    /// Deposit funds into an account
    Deposit {
        #[arg(long)]
        account: AccountNumber,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "KZT")]
        currency: CurrencyCode,
        #[arg(long)]
        description: Option<String>,
    },
    /// Withdraw funds from an account
    Withdraw {
        #[arg(long)]
        account: AccountNumber,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "KZT")]
        currency: CurrencyCode,
        #[arg(long)]
        description: Option<String>,
    },
    /// Pay a batch of salaries from a funding account
    Payroll {
        /// Funding account number
        #[arg(long)]
        funding: AccountNumber,
        /// JSON file holding an array of items:
        /// [{"national_id": "...", "amount": "1500.00", "currency": "KZT"}]
        #[arg(long)]
        file: PathBuf,
    },
    /// Check API health
    Health,
}

fn read_payroll_items(path: &Path) -> Result<Vec<PayrollItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading payroll file {}", path.display()))?;
    parse_payroll_items(&raw).with_context(|| format!("parsing payroll file {}", path.display()))
}

fn parse_payroll_items(raw: &str) -> Result<Vec<PayrollItem>> {
    let items: Vec<PayrollItem> = serde_json::from_str(raw)?;
    if items.is_empty() {
        anyhow::bail!("Payroll file contains no items");
    }
    Ok(items)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = LedgerClient::new(&cli.api_url);

    // Business rejections print the outcome and exit with status 2
    let accepted = match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
            }
            healthy
        }

        Commands::Transfer {
            from,
            to,
            amount,
            currency,
            description,
        } => {
            let resp = client
                .transfer(from, to, amount, currency, description)
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
            resp.outcome.is_ok()
        }

        Commands::Deposit {
            account,
            amount,
            currency,
            description,
        } => {
            let resp = client
                .deposit(account, amount, currency, description)
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
            resp.outcome.is_ok()
        }

        Commands::Withdraw {
            account,
            amount,
            currency,
            description,
        } => {
            let resp = client
                .withdraw(account, amount, currency, description)
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
            resp.outcome.is_ok()
        }

        Commands::Payroll { funding, file } => {
            let items = read_payroll_items(&file)?;
            let report = client.disburse(funding, items).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            report.success
        }
    };

    if !accepted {
        std::process::exit(2);
    }
    Ok(())
}
