//! Player-curated Legendary wishlist with its own pity counter.
use crate::backend::{CatalogLookup, WishlistRepository};
use crate::constants::{
    DEFAULT_WISHLIST_MAX_HEROES, DEFAULT_WISHLIST_THRESHOLD, LOG_TARGET_WISHLIST,
};
use crate::error::{ConfigError, PullError, StoreError, WishlistError};
use crate::ids::{ItemId, PlayerId, ServerId};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::numbers::count_to_u64;
use crate::pity::preflight_failure;
use crate::rarity::Element;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Size cap and guarantee threshold for one wishlist family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistLimits {
    #[serde(default = "WishlistLimits::default_max_heroes")]
    pub max_heroes: usize,
    #[serde(default = "WishlistLimits::default_threshold")]
    pub threshold: u32,
}

impl Default for WishlistLimits {
    fn default() -> Self {
        Self {
            max_heroes: Self::default_max_heroes(),
            threshold: Self::default_threshold(),
        }
    }
}

impl WishlistLimits {
    const fn default_max_heroes() -> usize {
        DEFAULT_WISHLIST_MAX_HEROES
    }

    const fn default_threshold() -> u32 {
        DEFAULT_WISHLIST_THRESHOLD
    }

    pub(crate) fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.max_heroes < 1 {
            return Err(ConfigError::MinViolation {
                field,
                min: 1,
                value: count_to_u64(self.max_heroes),
            });
        }
        if self.threshold < 1 {
            return Err(ConfigError::MinViolation {
                field,
                min: 1,
                value: u64::from(self.threshold),
            });
        }
        Ok(())
    }
}

/// Storage key for a wishlist. Elemental wishlists are tracked per element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WishlistKey {
    pub player: PlayerId,
    pub server: ServerId,
    #[serde(default)]
    pub element: Option<Element>,
}

impl WishlistKey {
    #[must_use]
    pub const fn new(player: PlayerId, server: ServerId, element: Option<Element>) -> Self {
        Self {
            player,
            server,
            element,
        }
    }
}

impl fmt::Display for WishlistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wishlist:{}@{}", self.player, self.server)?;
        if let Some(element) = self.element {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

/// Ordered set of wished heroes plus the wishlist pity counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistState {
    heroes: Vec<ItemId>,
    #[serde(default)]
    pub pity_counter: u32,
    pub threshold: u32,
    pub max_heroes: usize,
}

impl WishlistState {
    #[must_use]
    pub const fn new(limits: WishlistLimits) -> Self {
        Self {
            heroes: Vec::new(),
            pity_counter: 0,
            threshold: limits.threshold,
            max_heroes: limits.max_heroes,
        }
    }

    #[must_use]
    pub fn heroes(&self) -> &[ItemId] {
        &self.heroes
    }

    #[must_use]
    pub fn contains(&self, item: &ItemId) -> bool {
        self.heroes.contains(item)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heroes.is_empty()
    }

    /// Append a hero already vetted as Legendary.
    ///
    /// # Errors
    ///
    /// Returns `WishlistFull` or `DuplicateEntry`.
    pub fn push(&mut self, item: ItemId) -> Result<(), WishlistError> {
        if self.contains(&item) {
            return Err(WishlistError::DuplicateEntry(item));
        }
        if self.heroes.len() >= self.max_heroes {
            return Err(WishlistError::WishlistFull {
                max: self.max_heroes,
            });
        }
        self.heroes.push(item);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotOnWishlist` when the hero is absent.
    pub fn remove(&mut self, item: &ItemId) -> Result<(), WishlistError> {
        let position = self
            .heroes
            .iter()
            .position(|hero| hero == item)
            .ok_or_else(|| WishlistError::NotOnWishlist(item.clone()))?;
        self.heroes.remove(position);
        Ok(())
    }

    pub fn increment_pity(&mut self) {
        self.pity_counter = self.pity_counter.saturating_add(1);
    }

    pub fn reset_pity(&mut self) {
        self.pity_counter = 0;
    }

    /// True when the next draw must be a wishlist hit.
    #[must_use]
    pub fn is_due(&self) -> bool {
        !self.heroes.is_empty() && self.pity_counter.saturating_add(1) >= self.threshold
    }

    /// Uniformly choose one wished hero.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Option<&ItemId> {
        self.heroes.choose(rng)
    }
}

/// Exclusive, session-scoped hold on one wishlist key.
pub struct WishlistLease {
    key: WishlistKey,
    original: WishlistState,
    current: WishlistState,
    repo: Arc<dyn WishlistRepository>,
    _guard: KeyGuard<WishlistKey>,
}

impl fmt::Debug for WishlistLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WishlistLease")
            .field("key", &self.key)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl WishlistLease {
    #[must_use]
    pub const fn key(&self) -> &WishlistKey {
        &self.key
    }

    #[must_use]
    pub const fn original(&self) -> &WishlistState {
        &self.original
    }

    #[must_use]
    pub const fn state(&self) -> &WishlistState {
        &self.current
    }

    pub const fn state_mut(&mut self) -> &mut WishlistState {
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

/// Wishlist persistence, validation and per-key locking.
pub struct WishlistStore {
    repo: Arc<dyn WishlistRepository>,
    catalog: Arc<dyn CatalogLookup>,
    locks: KeyedLocks<WishlistKey>,
    limits: WishlistLimits,
    elemental_limits: WishlistLimits,
    lock_timeout: Duration,
}

impl fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WishlistStore")
            .field("limits", &self.limits)
            .field("elemental_limits", &self.elemental_limits)
            .finish_non_exhaustive()
    }
}

impl WishlistStore {
    #[must_use]
    pub fn new(
        repo: Arc<dyn WishlistRepository>,
        catalog: Arc<dyn CatalogLookup>,
        limits: WishlistLimits,
        elemental_limits: WishlistLimits,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            catalog,
            locks: KeyedLocks::new(),
            limits,
            elemental_limits,
            lock_timeout,
        }
    }

    /// Limits applied to wishlists created lazily under this key.
    #[must_use]
    pub const fn limits_for(&self, key: &WishlistKey) -> WishlistLimits {
        if key.element.is_some() {
            self.elemental_limits
        } else {
            self.limits
        }
    }

    /// # Errors
    ///
    /// Returns an error if the repository read fails.
    pub async fn snapshot(&self, key: &WishlistKey) -> Result<WishlistState, StoreError> {
        Ok(self
            .repo
            .load(key)
            .await?
            .unwrap_or_else(|| WishlistState::new(self.limits_for(key))))
    }

    /// Take the key for the duration of a session.
    ///
    /// # Errors
    ///
    /// Returns `PullError::ConcurrencyConflict` on lock timeout or
    /// `PullError::Persistence` if loading fails.
    pub async fn lock(&self, key: &WishlistKey) -> Result<WishlistLease, PullError> {
        let guard = self
            .locks
            .acquire_within(key, self.lock_timeout)
            .await
            .ok_or_else(|| PullError::ConcurrencyConflict {
                key: key.to_string(),
            })?;
        let original = self.snapshot(key).await.map_err(preflight_failure)?;
        Ok(self.lease(key, guard, original))
    }

    fn lease(
        &self,
        key: &WishlistKey,
        guard: KeyGuard<WishlistKey>,
        original: WishlistState,
    ) -> WishlistLease {
        WishlistLease {
            key: key.clone(),
            current: original.clone(),
            original,
            repo: Arc::clone(&self.repo),
            _guard: guard,
        }
    }

    async fn edit(
        &self,
        key: &WishlistKey,
        apply: impl FnOnce(&mut WishlistState) -> Result<(), WishlistError> + Send,
    ) -> Result<WishlistState, WishlistError> {
        let guard = self
            .locks
            .acquire_within(key, self.lock_timeout)
            .await
            .ok_or(WishlistError::ConcurrencyConflict)?;
        let original = self.snapshot(key).await?;
        let mut lease = self.lease(key, guard, original);
        apply(lease.state_mut())?;
        if lease.is_dirty() {
            lease.persist().await?;
        }
        Ok(lease.current.clone())
    }

    /// Add a Legendary hero to the wishlist. An elemental wishlist only takes
    /// heroes of its element.
    ///
    /// # Errors
    ///
    /// Returns `RarityNotAllowed`, `ElementMismatch`, `DuplicateEntry`,
    /// `WishlistFull`, a lock conflict or a store failure.
    pub async fn add_hero(
        &self,
        key: &WishlistKey,
        item: ItemId,
    ) -> Result<WishlistState, WishlistError> {
        if !self.catalog.is_legendary(&item).await? {
            return Err(WishlistError::RarityNotAllowed(item));
        }
        if let Some(expected) = key.element
            && self.catalog.element_of(&item).await? != Some(expected)
        {
            return Err(WishlistError::ElementMismatch { item, expected });
        }
        let state = self.edit(key, |state| state.push(item)).await?;
        log::debug!(target: LOG_TARGET_WISHLIST, "{key} now {:?}", state.heroes());
        Ok(state)
    }

    /// # Errors
    ///
    /// Returns `NotOnWishlist`, a lock conflict or a store failure.
    pub async fn remove_hero(
        &self,
        key: &WishlistKey,
        item: &ItemId,
    ) -> Result<WishlistState, WishlistError> {
        self.edit(key, |state| state.remove(item)).await
    }

    /// # Errors
    ///
    /// Returns a lock conflict or a store failure.
    pub async fn increment_pity(&self, key: &WishlistKey) -> Result<WishlistState, WishlistError> {
        self.edit(key, |state| {
            state.increment_pity();
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns a lock conflict or a store failure.
    pub async fn reset_pity(&self, key: &WishlistKey) -> Result<WishlistState, WishlistError> {
        self.edit(key, |state| {
            state.reset_pity();
            Ok(())
        })
        .await
    }
}
