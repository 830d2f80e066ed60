//! Process-wide named mutex keyed by string.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ledger_types::{NamedLockGuard, NamedMutex, RepoError};

type Slots = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// In-process [`NamedMutex`] backed by one async mutex per key.
///
/// Slots are created on first use and removed when the last holder or
/// waiter lets go, so the map only contains keys that are in use.
#[derive(Clone)]
pub struct KeyedMutex {
    slots: Slots,
    timeout: Duration,
}

impl KeyedMutex {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.slots.len()
    }
}

/// Holds the slot's guard and prunes the slot once it is released.
struct Held {
    key: String,
    slots: Slots,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Held {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[async_trait]
impl NamedMutex for KeyedMutex {
    async fn acquire(&self, key: &str) -> Result<NamedLockGuard, RepoError> {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let mut held = Held {
            key: key.to_string(),
            slots: self.slots.clone(),
            guard: None,
        };

        // On timeout `held` drops with no guard and prunes the slot if we
        // were the last waiter.
        let guard = tokio::time::timeout(self.timeout, slot.lock_owned())
            .await
            .map_err(|_| RepoError::LockTimeout)?;
        held.guard = Some(guard);

        tracing::debug!(key, "named lock acquired");
        Ok(NamedLockGuard::new(key, held))
    }
}
