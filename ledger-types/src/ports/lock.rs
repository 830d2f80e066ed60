//! Named mutual-exclusion port.

use crate::error::RepoError;

/// Proof of holding a named lock. The lock is released when this is dropped.
pub struct NamedLockGuard {
    key: String,
    _held: Box<dyn Send + Sync>,
}

impl NamedLockGuard {
    pub fn new(key: impl Into<String>, held: impl Send + Sync + 'static) -> Self {
        Self {
            key: key.into(),
            _held: Box::new(held),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for NamedLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLockGuard")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Mutual exclusion addressed by an opaque string key.
///
/// Any process-wide or cluster-wide primitive satisfies this, as long as two
/// holders of the same key never overlap.
#[async_trait::async_trait]
pub trait NamedMutex: Send + Sync {
    /// Waits for the lock on `key`, failing with `RepoError::LockTimeout`
    /// when the implementation's bounded wait runs out.
    async fn acquire(&self, key: &str) -> Result<NamedLockGuard, RepoError>;
}
