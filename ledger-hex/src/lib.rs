//! # Ledger Hex
//!
//! Application layer and HTTP adapter for the multi-currency ledger.
//!
//! ## Architecture
//!
//! - `rates` - Rate Resolver (directed pairs, never inverted)
//! - `limits` - Limit Tracker (today's completed spending per source account)
//! - `transfer` - Transfer Engine, plus deposits and withdrawals
//! - `payroll` - Payroll Disburser
//! - `service` - `LedgerService`, the facade the engines hang off
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: LedgerRepository`, allowing different
//! repository implementations to be injected.

pub mod inbound;
pub mod limits;
pub mod payroll;
pub mod rates;
pub mod service;
pub mod transfer;

#[cfg(test)]
mod service_tests;

pub use service::LedgerService;
