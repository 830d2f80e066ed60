//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod admin;
mod audit;
mod lock;
mod store;

pub use admin::AdminStore;
pub use audit::AuditEmitter;
pub use lock::{NamedLockGuard, NamedMutex};
pub use store::{
    AccountStore, CustomerStore, LedgerRepository, LedgerStore, RateStore, UnitOfWork,
};
