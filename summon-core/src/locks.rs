//! Per-key exclusive locks serializing sessions on the same pity or wishlist key.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of async mutexes, one per key, created on demand.
///
/// Entries nobody holds or waits on are pruned whenever a new key is inserted,
/// so the registry tracks live contention rather than every key ever seen.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

/// Held lock on a single key; released on drop.
#[derive(Debug)]
pub struct KeyGuard<K> {
    key: K,
    _guard: OwnedMutexGuard<()>,
}

impl<K> KeyGuard<K> {
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        let slot = Arc::new(AsyncMutex::new(()));
        slots.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    /// Wait until the key is free.
    pub async fn acquire(&self, key: &K) -> KeyGuard<K> {
        let guard = self.slot(key).lock_owned().await;
        KeyGuard {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Wait at most `timeout` for the key; `None` means another holder kept it.
    pub async fn acquire_within(&self, key: &K, timeout: Duration) -> Option<KeyGuard<K>> {
        let slot = self.slot(key);
        let guard = tokio::time::timeout(timeout, slot.lock_owned()).await.ok()?;
        Some(KeyGuard {
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Take the key only if nobody holds it right now.
    #[must_use]
    pub fn try_acquire(&self, key: &K) -> Option<KeyGuard<K>> {
        let guard = self.slot(key).try_lock_owned().ok()?;
        Some(KeyGuard {
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
