//! Per (player, banner) pity counters.
use crate::backend::PityRepository;
use crate::error::{CommitStep, PullError, RefundStatus, StoreError};
use crate::ids::{BannerId, PlayerId};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::rarity::{Element, Rarity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Storage key for pity counters. Elemental banners track each element apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PityKey {
    pub player: PlayerId,
    pub banner: BannerId,
    #[serde(default)]
    pub element: Option<Element>,
}

impl PityKey {
    #[must_use]
    pub const fn new(player: PlayerId, banner: BannerId, element: Option<Element>) -> Self {
        Self {
            player,
            banner,
            element,
        }
    }
}

impl fmt::Display for PityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pity:{}/{}", self.player, self.banner)?;
        if let Some(element) = self.element {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

/// Counters since the last Legendary / Epic on one key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PityState {
    #[serde(default)]
    pub pulls_since_legendary: u32,
    #[serde(default)]
    pub pulls_since_epic: u32,
    #[serde(default)]
    pub total_pulls: u32,
    #[serde(default)]
    pub has_received_legendary: bool,
    #[serde(default)]
    pub last_pull_at: Option<DateTime<Utc>>,
}

impl PityState {
    /// Count one draw on both counters.
    pub fn increment(&mut self, at: DateTime<Utc>) {
        self.pulls_since_legendary = self.pulls_since_legendary.saturating_add(1);
        self.pulls_since_epic = self.pulls_since_epic.saturating_add(1);
        self.total_pulls = self.total_pulls.saturating_add(1);
        self.last_pull_at = Some(at);
    }

    /// Apply the reset for a drawn rarity. A Legendary subsumes the Epic guarantee.
    pub fn reset_on_rarity(&mut self, rarity: Rarity) {
        match rarity {
            Rarity::Legendary => {
                self.pulls_since_legendary = 0;
                self.pulls_since_epic = 0;
                self.has_received_legendary = true;
            }
            Rarity::Epic => self.pulls_since_epic = 0,
            Rarity::Common | Rarity::Rare => {}
        }
    }

    /// Full bookkeeping for one draw: increment first, then reset.
    pub fn register_draw(&mut self, rarity: Rarity, at: DateTime<Utc>) {
        self.increment(at);
        self.reset_on_rarity(rarity);
    }
}

/// Exclusive, session-scoped hold on one pity key.
///
/// The working copy is mutated in memory; `persist` writes it and `restore`
/// writes back the state seen when the lease was taken.
pub struct PityLease {
    key: PityKey,
    original: PityState,
    current: PityState,
    repo: Arc<dyn PityRepository>,
    _guard: KeyGuard<PityKey>,
}

impl fmt::Debug for PityLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PityLease")
            .field("key", &self.key)
            .field("original", &self.original)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl PityLease {
    #[must_use]
    pub const fn key(&self) -> &PityKey {
        &self.key
    }

    #[must_use]
    pub const fn original(&self) -> &PityState {
        &self.original
    }

    #[must_use]
    pub const fn state(&self) -> &PityState {
        &self.current
    }

    pub const fn state_mut(&mut self) -> &mut PityState {
        &mut self.current
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.current != self.original
    }

    /// # Errors
    ///
    /// Returns an error if the repository write fails.
    pub async fn persist(&self) -> Result<(), StoreError> {
        self.repo.save(&self.key, &self.current).await
    }

    /// # Errors
    ///
    /// Returns an error if the repository write fails.
    pub async fn restore(&self) -> Result<(), StoreError> {
        self.repo.save(&self.key, &self.original).await
    }
}

/// Pity counter persistence guarded by per-key locks.
pub struct PityCounterStore {
    repo: Arc<dyn PityRepository>,
    locks: KeyedLocks<PityKey>,
    lock_timeout: Duration,
}

impl fmt::Debug for PityCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PityCounterStore")
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl PityCounterStore {
    #[must_use]
    pub fn new(repo: Arc<dyn PityRepository>, lock_timeout: Duration) -> Self {
        Self {
            repo,
            locks: KeyedLocks::new(),
            lock_timeout,
        }
    }

    /// Current persisted state, or a fresh one for an unseen key.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository read fails.
    pub async fn snapshot(&self, key: &PityKey) -> Result<PityState, StoreError> {
        Ok(self.repo.load(key).await?.unwrap_or_default())
    }

    /// Take the key for the duration of a session.
    ///
    /// # Errors
    ///
    /// Returns `PullError::ConcurrencyConflict` if another session keeps the
    /// key past the lock timeout, or `PullError::Persistence` if loading fails.
    pub async fn lock(&self, key: &PityKey) -> Result<PityLease, PullError> {
        let guard = self
            .locks
            .acquire_within(key, self.lock_timeout)
            .await
            .ok_or_else(|| PullError::ConcurrencyConflict {
                key: key.to_string(),
            })?;
        let original = self.snapshot(key).await.map_err(preflight_failure)?;
        Ok(PityLease {
            key: key.clone(),
            current: original.clone(),
            original,
            repo: Arc::clone(&self.repo),
            _guard: guard,
        })
    }

    /// Count one draw outside a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is busy or the repository fails.
    pub async fn increment(&self, key: &PityKey) -> Result<PityState, PullError> {
        self.update(key, |state| state.increment(Utc::now())).await
    }

    /// Apply a rarity reset outside a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is busy or the repository fails.
    pub async fn reset_on_rarity(
        &self,
        key: &PityKey,
        rarity: Rarity,
    ) -> Result<PityState, PullError> {
        self.update(key, |state| state.reset_on_rarity(rarity)).await
    }

    async fn update(
        &self,
        key: &PityKey,
        apply: impl FnOnce(&mut PityState) + Send,
    ) -> Result<PityState, PullError> {
        let mut lease = self.lock(key).await?;
        apply(lease.state_mut());
        lease.persist().await.map_err(|source| PullError::Persistence {
            step: CommitStep::SavePity,
            source,
            refund: RefundStatus::NotNeeded,
        })?;
        Ok(lease.current.clone())
    }
}

pub(crate) fn preflight_failure(source: StoreError) -> PullError {
    PullError::Persistence {
        step: CommitStep::Preflight,
        source,
        refund: RefundStatus::NotNeeded,
    }
}
