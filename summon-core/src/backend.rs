//! Collaborator interfaces the engine talks to.
//!
//! Platform-specific implementations provide these; `crate::memory` ships
//! in-process versions used by the simulator and the tests.
use crate::currency::{CurrencyAmount, CurrencyKind};
use crate::error::{ReserveError, StoreError};
use crate::history::PullRecord;
use crate::ids::{BannerId, GrantKey, ItemId, PlayerId, ReservationId};
use crate::pity::{PityKey, PityState};
use crate::rarity::{Element, Rarity};
use crate::wishlist::{WishlistKey, WishlistState};
use async_trait::async_trait;

/// Read-only item catalog.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Candidate items of one rarity for a banner. An empty list is a
    /// configuration problem the caller reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    async fn pool_by_rarity(
        &self,
        banner: &BannerId,
        rarity: Rarity,
    ) -> Result<Vec<ItemId>, StoreError>;

    /// Whether the item is a Legendary hero.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    async fn is_legendary(&self, item: &ItemId) -> Result<bool, StoreError>;

    /// Element of a hero; `None` for element-less or unknown items.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    async fn element_of(&self, item: &ItemId) -> Result<Option<Element>, StoreError>;
}

/// Player currency balances with two-phase debits.
#[async_trait]
pub trait CurrencyLedger: Send + Sync {
    /// Place a hold on `amount` of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `ReserveError::InsufficientFunds` when the balance is too low.
    async fn reserve(
        &self,
        player: &PlayerId,
        amount: CurrencyAmount,
    ) -> Result<ReservationId, ReserveError>;

    /// Turn a hold into a final debit.
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation is unknown or the write fails.
    async fn commit(&self, reservation: ReservationId) -> Result<(), StoreError>;

    /// Drop a hold, returning the currency to the player.
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation is unknown or the write fails.
    async fn release(&self, reservation: ReservationId) -> Result<(), StoreError>;

    /// Pay currency into the player's balance. A second credit under the same
    /// `grant` has no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn credit(
        &self,
        player: &PlayerId,
        amount: CurrencyAmount,
        grant: GrantKey,
    ) -> Result<(), StoreError>;

    /// Take back the credit made under `grant` (compensation only). A no-op
    /// when that credit never landed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn debit(
        &self,
        player: &PlayerId,
        amount: CurrencyAmount,
        grant: GrantKey,
    ) -> Result<(), StoreError>;

    /// Spendable balance, excluding held amounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    async fn balance(&self, player: &PlayerId, kind: CurrencyKind) -> Result<u64, StoreError>;
}

/// Player collection.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    async fn has(&self, player: &PlayerId, item: &ItemId) -> Result<bool, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn grant(&self, player: &PlayerId, item: &ItemId) -> Result<(), StoreError>;

    /// Add fragments at most once per `grant`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn grant_fragments(
        &self,
        player: &PlayerId,
        item: &ItemId,
        amount: u32,
        grant: GrantKey,
    ) -> Result<(), StoreError>;

    /// Undo a `grant` (compensation only).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn revoke(&self, player: &PlayerId, item: &ItemId) -> Result<(), StoreError>;

    /// Undo the `grant_fragments` made under `grant` (compensation only). A
    /// no-op when that grant never landed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn revoke_fragments(
        &self,
        player: &PlayerId,
        item: &ItemId,
        amount: u32,
        grant: GrantKey,
    ) -> Result<(), StoreError>;
}

/// Durable storage of pity counters.
#[async_trait]
pub trait PityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    async fn load(&self, key: &PityKey) -> Result<Option<PityState>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    async fn save(&self, key: &PityKey, state: &PityState) -> Result<(), StoreError>;
}

/// Durable storage of wishlists.
#[async_trait]
pub trait WishlistRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    async fn load(&self, key: &WishlistKey) -> Result<Option<WishlistState>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    async fn save(&self, key: &WishlistKey, state: &WishlistState) -> Result<(), StoreError>;
}

/// Append-only audit log of completed sessions.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    async fn append(&self, record: &PullRecord) -> Result<(), StoreError>;
}
