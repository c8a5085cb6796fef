//! In-process backends for the simulator and tests, with fault injection.
use crate::backend::{
    CatalogLookup, CurrencyLedger, HistorySink, OwnershipStore, PityRepository,
    WishlistRepository,
};
use crate::currency::{CurrencyAmount, CurrencyKind};
use crate::error::{ReserveError, StoreError};
use crate::history::PullRecord;
use crate::ids::{BannerId, GrantKey, ItemId, PlayerId, ReservationId};
use crate::pity::{PityKey, PityState};
use crate::rarity::{Element, Rarity};
use crate::session::Backends;
use crate::wishlist::{WishlistKey, WishlistState};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct FaultState {
    fail_after: Option<u32>,
    fail_every: Option<u32>,
    calls: u64,
    delay: Option<Duration>,
    ack_delay: Option<Duration>,
}

/// Scripted failures and latency for one group of backend operations.
#[derive(Debug, Default)]
pub struct Faults {
    state: Mutex<FaultState>,
}

impl Faults {
    /// Fail the next call once.
    pub fn fail_next(&self) {
        self.fail_after(0);
    }

    /// Let `successes` calls through, then fail one.
    pub fn fail_after(&self, successes: u32) {
        lock(&self.state).fail_after = Some(successes);
    }

    /// Fail every `n`-th call from now on. Zero disables.
    pub fn fail_every(&self, n: u32) {
        let mut state = lock(&self.state);
        state.fail_every = (n > 0).then_some(n);
        state.calls = 0;
    }

    /// Delay every call, e.g. to exceed a commit timeout.
    pub fn delay(&self, delay: Duration) {
        lock(&self.state).delay = Some(delay);
    }

    /// Apply writes right away but hold back their acknowledgement, so a
    /// caller that gives up still leaves the write behind.
    pub fn delay_ack(&self, delay: Duration) {
        lock(&self.state).ack_delay = Some(delay);
    }

    pub fn clear(&self) {
        *lock(&self.state) = FaultState::default();
    }

    async fn check(&self, op: &'static str) -> Result<(), StoreError> {
        let (delay, fail) = {
            let mut state = lock(&self.state);
            state.calls = state.calls.saturating_add(1);
            let scripted = match state.fail_after {
                Some(0) => {
                    state.fail_after = None;
                    true
                }
                Some(remaining) => {
                    state.fail_after = Some(remaining - 1);
                    false
                }
                None => false,
            };
            let periodic = state
                .fail_every
                .is_some_and(|n| state.calls % u64::from(n) == 0);
            (state.delay, scripted || periodic)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Unavailable(format!("injected fault in {op}")));
        }
        Ok(())
    }

    async fn acknowledge(&self) {
        let delay = lock(&self.state).ack_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    id: ItemId,
    rarity: Rarity,
    element: Option<Element>,
}

/// Item catalog held in memory. Banners restricted to an element only see
/// heroes of that element.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: Vec<CatalogEntry>,
    banner_elements: HashMap<BannerId, Element>,
    pub faults: Faults,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(mut self, rarity: Rarity, ids: &[&str]) -> Self {
        self.items.extend(ids.iter().map(|id| CatalogEntry {
            id: ItemId::new(id),
            rarity,
            element: None,
        }));
        self
    }

    #[must_use]
    pub fn with_hero(mut self, id: &str, rarity: Rarity, element: Element) -> Self {
        self.items.push(CatalogEntry {
            id: ItemId::new(id),
            rarity,
            element: Some(element),
        });
        self
    }

    #[must_use]
    pub fn with_banner_element(mut self, banner: &BannerId, element: Element) -> Self {
        self.banner_elements.insert(banner.clone(), element);
        self
    }

    #[must_use]
    pub fn rarity_of(&self, item: &ItemId) -> Option<Rarity> {
        self.items
            .iter()
            .find(|entry| &entry.id == item)
            .map(|entry| entry.rarity)
    }
}

#[async_trait]
impl CatalogLookup for MemoryCatalog {
    async fn pool_by_rarity(
        &self,
        banner: &BannerId,
        rarity: Rarity,
    ) -> Result<Vec<ItemId>, StoreError> {
        self.faults.check("catalog.pool_by_rarity").await?;
        let restriction = self.banner_elements.get(banner).copied();
        Ok(self
            .items
            .iter()
            .filter(|entry| entry.rarity == rarity)
            .filter(|entry| restriction.is_none_or(|element| entry.element == Some(element)))
            .map(|entry| entry.id.clone())
            .collect())
    }

    async fn is_legendary(&self, item: &ItemId) -> Result<bool, StoreError> {
        Ok(self.rarity_of(item) == Some(Rarity::Legendary))
    }

    async fn element_of(&self, item: &ItemId) -> Result<Option<Element>, StoreError> {
        Ok(self
            .items
            .iter()
            .find(|entry| &entry.id == item)
            .and_then(|entry| entry.element))
    }
}

#[derive(Debug, Clone)]
struct Hold {
    player: PlayerId,
    amount: CurrencyAmount,
}

#[derive(Debug, Default)]
struct LedgerBook {
    balances: HashMap<(PlayerId, CurrencyKind), u64>,
    holds: HashMap<ReservationId, Hold>,
    credits: HashSet<GrantKey>,
}

/// Currency ledger where a reservation moves funds out of the spendable
/// balance into a hold until it is committed or released.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    book: Mutex<LedgerBook>,
    next_id: AtomicU64,
    pub reserve_faults: Faults,
    pub commit_faults: Faults,
    pub release_faults: Faults,
    pub credit_faults: Faults,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, player: &PlayerId, amount: CurrencyAmount) {
        let mut book = lock(&self.book);
        let balance = book
            .balances
            .entry((player.clone(), amount.kind))
            .or_default();
        *balance = balance.saturating_add(amount.amount);
    }

    #[must_use]
    pub fn spendable(&self, player: &PlayerId, kind: CurrencyKind) -> u64 {
        lock(&self.book)
            .balances
            .get(&(player.clone(), kind))
            .copied()
            .unwrap_or(0)
    }

    /// Holds neither committed nor released.
    #[must_use]
    pub fn open_holds(&self) -> usize {
        lock(&self.book).holds.len()
    }
}

#[async_trait]
impl CurrencyLedger for MemoryLedger {
    async fn reserve(
        &self,
        player: &PlayerId,
        amount: CurrencyAmount,
    ) -> Result<ReservationId, ReserveError> {
        self.reserve_faults.check("ledger.reserve").await?;
        let mut book = lock(&self.book);
        let balance = book
            .balances
            .entry((player.clone(), amount.kind))
            .or_default();
        if *balance < amount.amount {
            return Err(ReserveError::InsufficientFunds {
                kind: amount.kind,
                required: amount.amount,
                available: *balance,
            });
        }
        *balance -= amount.amount;
        let id = ReservationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        book.holds.insert(
            id,
            Hold {
                player: player.clone(),
                amount,
            },
        );
        Ok(id)
    }

    async fn commit(&self, reservation: ReservationId) -> Result<(), StoreError> {
        self.commit_faults.check("ledger.commit").await?;
        lock(&self.book)
            .holds
            .remove(&reservation)
            .map(|_| ())
            .ok_or(StoreError::UnknownReservation(reservation))
    }

    async fn release(&self, reservation: ReservationId) -> Result<(), StoreError> {
        self.release_faults.check("ledger.release").await?;
        let mut book = lock(&self.book);
        let hold = book
            .holds
            .remove(&reservation)
            .ok_or(StoreError::UnknownReservation(reservation))?;
        let balance = book
            .balances
            .entry((hold.player, hold.amount.kind))
            .or_default();
        *balance = balance.saturating_add(hold.amount.amount);
        Ok(())
    }

    async fn credit(
        &self,
        player: &PlayerId,
        amount: CurrencyAmount,
        grant: GrantKey,
    ) -> Result<(), StoreError> {
        self.credit_faults.check("ledger.credit").await?;
        if lock(&self.book).credits.insert(grant) {
            self.deposit(player, amount);
        }
        self.credit_faults.acknowledge().await;
        Ok(())
    }

    async fn debit(
        &self,
        player: &PlayerId,
        amount: CurrencyAmount,
        grant: GrantKey,
    ) -> Result<(), StoreError> {
        let mut book = lock(&self.book);
        if !book.credits.remove(&grant) {
            return Ok(());
        }
        let balance = book
            .balances
            .entry((player.clone(), amount.kind))
            .or_default();
        *balance = balance.saturating_sub(amount.amount);
        Ok(())
    }

    async fn balance(&self, player: &PlayerId, kind: CurrencyKind) -> Result<u64, StoreError> {
        Ok(self.spendable(player, kind))
    }
}

#[derive(Debug, Default)]
struct Collection {
    owned: HashSet<(PlayerId, ItemId)>,
    fragments: HashMap<(PlayerId, ItemId), u64>,
    fragment_grants: HashSet<GrantKey>,
}

/// Player collections held in memory.
#[derive(Debug, Default)]
pub struct MemoryOwnership {
    collection: Mutex<Collection>,
    pub read_faults: Faults,
    pub write_faults: Faults,
}

impl MemoryOwnership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, player: &PlayerId, item: &ItemId) {
        lock(&self.collection)
            .owned
            .insert((player.clone(), item.clone()));
    }

    #[must_use]
    pub fn owns(&self, player: &PlayerId, item: &ItemId) -> bool {
        lock(&self.collection)
            .owned
            .contains(&(player.clone(), item.clone()))
    }

    #[must_use]
    pub fn owned_count(&self, player: &PlayerId) -> usize {
        lock(&self.collection)
            .owned
            .iter()
            .filter(|(owner, _)| owner == player)
            .count()
    }

    #[must_use]
    pub fn fragments(&self, player: &PlayerId, item: &ItemId) -> u64 {
        lock(&self.collection)
            .fragments
            .get(&(player.clone(), item.clone()))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn total_fragments(&self, player: &PlayerId) -> u64 {
        lock(&self.collection)
            .fragments
            .iter()
            .filter(|((owner, _), _)| owner == player)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

#[async_trait]
impl OwnershipStore for MemoryOwnership {
    async fn has(&self, player: &PlayerId, item: &ItemId) -> Result<bool, StoreError> {
        self.read_faults.check("ownership.has").await?;
        Ok(self.owns(player, item))
    }

    async fn grant(&self, player: &PlayerId, item: &ItemId) -> Result<(), StoreError> {
        self.write_faults.check("ownership.grant").await?;
        self.insert(player, item);
        self.write_faults.acknowledge().await;
        Ok(())
    }

    async fn grant_fragments(
        &self,
        player: &PlayerId,
        item: &ItemId,
        amount: u32,
        grant: GrantKey,
    ) -> Result<(), StoreError> {
        self.write_faults.check("ownership.grant_fragments").await?;
        {
            let mut collection = lock(&self.collection);
            if collection.fragment_grants.insert(grant) {
                let total = collection
                    .fragments
                    .entry((player.clone(), item.clone()))
                    .or_default();
                *total = total.saturating_add(u64::from(amount));
            }
        }
        self.write_faults.acknowledge().await;
        Ok(())
    }

    async fn revoke(&self, player: &PlayerId, item: &ItemId) -> Result<(), StoreError> {
        lock(&self.collection)
            .owned
            .remove(&(player.clone(), item.clone()));
        Ok(())
    }

    async fn revoke_fragments(
        &self,
        player: &PlayerId,
        item: &ItemId,
        amount: u32,
        grant: GrantKey,
    ) -> Result<(), StoreError> {
        let mut collection = lock(&self.collection);
        if !collection.fragment_grants.remove(&grant) {
            return Ok(());
        }
        if let Some(total) = collection
            .fragments
            .get_mut(&(player.clone(), item.clone()))
        {
            *total = total.saturating_sub(u64::from(amount));
        }
        Ok(())
    }
}

/// Pity counters held in memory.
#[derive(Debug, Default)]
pub struct MemoryPityRepository {
    states: Mutex<HashMap<PityKey, PityState>>,
    pub save_faults: Faults,
}

impl MemoryPityRepository {
    #[must_use]
    pub fn get(&self, key: &PityKey) -> Option<PityState> {
        lock(&self.states).get(key).cloned()
    }

    pub fn put(&self, key: PityKey, state: PityState) {
        lock(&self.states).insert(key, state);
    }
}

#[async_trait]
impl PityRepository for MemoryPityRepository {
    async fn load(&self, key: &PityKey) -> Result<Option<PityState>, StoreError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &PityKey, state: &PityState) -> Result<(), StoreError> {
        self.save_faults.check("pity.save").await?;
        self.put(key.clone(), state.clone());
        self.save_faults.acknowledge().await;
        Ok(())
    }
}

/// Wishlists held in memory.
#[derive(Debug, Default)]
pub struct MemoryWishlistRepository {
    states: Mutex<HashMap<WishlistKey, WishlistState>>,
    pub save_faults: Faults,
}

impl MemoryWishlistRepository {
    #[must_use]
    pub fn get(&self, key: &WishlistKey) -> Option<WishlistState> {
        lock(&self.states).get(key).cloned()
    }

    pub fn put(&self, key: WishlistKey, state: WishlistState) {
        lock(&self.states).insert(key, state);
    }
}

#[async_trait]
impl WishlistRepository for MemoryWishlistRepository {
    async fn load(&self, key: &WishlistKey) -> Result<Option<WishlistState>, StoreError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &WishlistKey, state: &WishlistState) -> Result<(), StoreError> {
        self.save_faults.check("wishlist.save").await?;
        self.put(key.clone(), state.clone());
        self.save_faults.acknowledge().await;
        Ok(())
    }
}

/// Append-only history kept in memory.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<PullRecord>>,
    pub append_faults: Faults,
}

impl MemoryHistory {
    #[must_use]
    pub fn records(&self) -> Vec<PullRecord> {
        lock(&self.records).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn append(&self, record: &PullRecord) -> Result<(), StoreError> {
        self.append_faults.check("history.append").await?;
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// Handles to one full set of in-memory backends.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackends {
    pub catalog: Arc<MemoryCatalog>,
    pub ledger: Arc<MemoryLedger>,
    pub ownership: Arc<MemoryOwnership>,
    pub pity: Arc<MemoryPityRepository>,
    pub wishlists: Arc<MemoryWishlistRepository>,
    pub history: Arc<MemoryHistory>,
}

impl MemoryBackends {
    #[must_use]
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            ..Self::default()
        }
    }

    /// Type-erased view for `PullService::new`.
    #[must_use]
    pub fn backends(&self) -> Backends {
        Backends {
            catalog: self.catalog.clone(),
            ledger: self.ledger.clone(),
            ownership: self.ownership.clone(),
            pity: self.pity.clone(),
            wishlists: self.wishlists.clone(),
            history: self.history.clone(),
        }
    }
}
