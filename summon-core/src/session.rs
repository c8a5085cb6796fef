//! Pull sessions: the state machine and the service that runs it end to end.
use crate::backend::{
    CatalogLookup, CurrencyLedger, HistorySink, OwnershipStore, PityRepository,
    WishlistRepository,
};
use crate::banner::{Banner, BannerCatalog, BannerType};
use crate::bonus::{BonusContext, BonusDropRoller};
use crate::config::EngineConfig;
use crate::constants::{LOG_TARGET_COMMIT, LOG_TARGET_DRAW, LOG_TARGET_SESSION};
use crate::currency::{CurrencyAmount, CurrencyKind};
use crate::error::{
    CommitStep, ConfigError, PullError, RefundStatus, ReserveError, StoreError, TransitionError,
};
use crate::history::{BonusDrops, HistoryRecorder, PullEntry, PullRecord, PullType};
use crate::ids::{BannerId, GrantKey, ItemId, PlayerId, ReservationId, ServerId, SessionId};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::materializer::{ItemMaterializer, OwnershipSnapshot};
use crate::pity::{PityCounterStore, PityKey, PityLease, preflight_failure};
use crate::rarity::Rarity;
use crate::resolver::{RarityResolver, Resolution};
use crate::rng::RngBundle;
use crate::wishlist::{WishlistKey, WishlistLease, WishlistStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Created,
    CostVerified,
    Drawing,
    Materializing,
    Committing,
    Completed,
    Failed,
}

impl SessionPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward moves follow the pipeline; `Failed` is reachable from any
    /// non-terminal phase.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        match (self, to) {
            (Self::Created, Self::CostVerified)
            | (Self::CostVerified, Self::Drawing)
            | (Self::Drawing, Self::Materializing)
            | (Self::Materializing, Self::Committing)
            | (Self::Committing, Self::Completed) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::CostVerified => "cost verified",
            Self::Drawing => "drawing",
            Self::Materializing => "materializing",
            Self::Committing => "committing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Phase tracker for one session, keeping every phase it went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSession {
    id: SessionId,
    phase: SessionPhase,
    trace: SmallVec<[SessionPhase; 7]>,
}

impl PullSession {
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        let mut trace = SmallVec::new();
        trace.push(SessionPhase::Created);
        Self {
            id,
            phase: SessionPhase::Created,
            trace,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn trace(&self) -> &[SessionPhase] {
        &self.trace
    }

    /// # Errors
    ///
    /// Returns `TransitionError` for a move the state machine does not allow.
    pub fn advance(&mut self, to: SessionPhase) -> Result<(), TransitionError> {
        if !self.phase.can_transition(to) {
            return Err(TransitionError {
                from: self.phase,
                to,
            });
        }
        log::trace!(target: LOG_TARGET_SESSION, "{} {} -> {}", self.id, self.phase, to);
        self.phase = to;
        self.trace.push(to);
        Ok(())
    }

    /// Mark the session failed. Terminal sessions are left untouched.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = SessionPhase::Failed;
            self.trace.push(SessionPhase::Failed);
        }
    }
}

/// A player's request to draw on a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub player: PlayerId,
    pub server: ServerId,
    pub banner: BannerId,
    pub draws: u32,
    /// Pins the session RNG; drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub promotional: bool,
}

impl PullRequest {
    #[must_use]
    pub const fn new(player: PlayerId, server: ServerId, banner: BannerId, draws: u32) -> Self {
        Self {
            player,
            server,
            banner,
            draws,
            seed: None,
            promotional: false,
        }
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn promotional(mut self, promotional: bool) -> Self {
        self.promotional = promotional;
        self
    }
}

/// Successful session result.
#[derive(Debug, Clone, PartialEq)]
pub struct PullOutcome {
    pub record: PullRecord,
    pub trace: Vec<SessionPhase>,
    /// False when the history sink rejected the record after commit.
    pub history_recorded: bool,
}

impl PullOutcome {
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.record.session_id
    }

    #[must_use]
    pub fn entries(&self) -> &[PullEntry] {
        &self.record.entries
    }

    #[must_use]
    pub fn wishlist_hits(&self) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.is_wishlist_hit)
            .count()
    }

    #[must_use]
    pub fn bonus_totals(&self) -> BTreeMap<CurrencyKind, u64> {
        self.record.bonus_totals()
    }
}

/// Collaborators a `PullService` talks to.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn CatalogLookup>,
    pub ledger: Arc<dyn CurrencyLedger>,
    pub ownership: Arc<dyn OwnershipStore>,
    pub pity: Arc<dyn PityRepository>,
    pub wishlists: Arc<dyn WishlistRepository>,
    pub history: Arc<dyn HistorySink>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

type PoolSet = BTreeMap<Rarity, Vec<ItemId>>;

/// A commit step that may have reached its backend.
#[derive(Debug, Clone)]
enum Applied {
    Pity,
    Wishlist,
    Item(ItemId),
    Fragments(ItemId, u32, GrantKey),
    Credit(CurrencyAmount, GrantKey),
}

/// What the commit phase changed so far, for compensation in reverse.
///
/// Every write is journaled before it is issued, since a timeout can drop the
/// call after the backend applied it. Writes that are not idempotent carry a
/// `GrantKey`, so the backend undoes them only if they landed.
#[derive(Debug)]
struct Journal {
    session: SessionId,
    applied: Vec<Applied>,
    pending: CommitStep,
    grants: u32,
}

impl Journal {
    const fn new(session: SessionId) -> Self {
        Self {
            session,
            applied: Vec::new(),
            pending: CommitStep::SavePity,
            grants: 0,
        }
    }

    fn next_grant(&mut self) -> GrantKey {
        let key = GrantKey::new(self.session, self.grants);
        self.grants = self.grants.saturating_add(1);
        key
    }
}

/// Reason a session stopped after currency was reserved.
#[derive(Debug)]
enum Abort {
    Step { step: CommitStep, source: StoreError },
    Config(ConfigError),
    Transition(TransitionError),
}

impl Abort {
    fn at(step: CommitStep) -> impl Fn(StoreError) -> Self {
        move |source| Self::Step { step, source }
    }

    fn into_error(self, refund: RefundStatus) -> PullError {
        match self {
            Self::Step { step, source } => PullError::Persistence {
                step,
                source,
                refund,
            },
            Self::Config(err) => PullError::Configuration(err),
            Self::Transition(err) => PullError::Transition(err),
        }
    }
}

impl From<TransitionError> for Abort {
    fn from(err: TransitionError) -> Self {
        Self::Transition(err)
    }
}

/// Everything a session holds between preflight and the end of the run.
struct Run<'a> {
    session: PullSession,
    request: &'a PullRequest,
    banner: &'a Banner,
    pools: PoolSet,
    pity: PityLease,
    wishlist: Option<WishlistLease>,
    _collection: KeyGuard<PlayerId>,
    rng: RngBundle,
    cost: CurrencyAmount,
    entries: Vec<PullEntry>,
}

/// Runs pull sessions against the configured banners and backends.
pub struct PullService {
    banners: BannerCatalog,
    config: EngineConfig,
    backends: Backends,
    pity: PityCounterStore,
    wishlists: WishlistStore,
    resolver: RarityResolver,
    materializer: ItemMaterializer,
    bonus: BonusDropRoller,
    history: HistoryRecorder,
    collections: KeyedLocks<PlayerId>,
    next_session: AtomicU64,
}

impl fmt::Debug for PullService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullService")
            .field("banners", &self.banners.banners.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PullService {
    /// # Errors
    ///
    /// Returns `ConfigError` when the banner catalog or engine settings are invalid.
    pub fn new(
        banners: BannerCatalog,
        config: EngineConfig,
        backends: Backends,
    ) -> Result<Self, ConfigError> {
        banners.validate()?;
        config.validate()?;
        let pity = PityCounterStore::new(Arc::clone(&backends.pity), config.lock_timeout());
        let wishlists = WishlistStore::new(
            Arc::clone(&backends.wishlists),
            Arc::clone(&backends.catalog),
            config.wishlist,
            config.elemental_wishlist,
            config.lock_timeout(),
        );
        Ok(Self {
            pity,
            wishlists,
            resolver: RarityResolver::new(),
            materializer: ItemMaterializer::new(config.fragments),
            bonus: BonusDropRoller::new(config.bonus.clone()),
            history: HistoryRecorder::new(Arc::clone(&backends.history)),
            collections: KeyedLocks::new(),
            next_session: AtomicU64::new(0),
            banners,
            config,
            backends,
        })
    }

    #[must_use]
    pub const fn banners(&self) -> &BannerCatalog {
        &self.banners
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn pity_store(&self) -> &PityCounterStore {
        &self.pity
    }

    /// Wishlist store sharing this service's locks, for player edits.
    #[must_use]
    pub const fn wishlists(&self) -> &WishlistStore {
        &self.wishlists
    }

    /// Wishlist a draw on `banner` reads and advances, if any.
    #[must_use]
    pub fn wishlist_key(
        banner: &Banner,
        player: &PlayerId,
        server: &ServerId,
    ) -> Option<WishlistKey> {
        if !banner.uses_wishlist() {
            return None;
        }
        let element = if banner.kind == BannerType::Elemental {
            banner.element
        } else {
            None
        };
        Some(WishlistKey::new(player.clone(), server.clone(), element))
    }

    fn next_session_id(&self) -> SessionId {
        SessionId(self.next_session.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Run one session to completion.
    ///
    /// Either every draw is persisted and the currency is spent, or nothing
    /// changes and any reserved currency is released.
    ///
    /// # Errors
    ///
    /// Returns `PullError` describing why the session failed and what happened
    /// to the reserved currency.
    pub async fn pull(&self, request: PullRequest) -> Result<PullOutcome, PullError> {
        let session_id = self.next_session_id();
        let result = self.run(session_id, &request).await;
        if let Err(err) = &result {
            log::warn!(
                target: LOG_TARGET_SESSION,
                "{session_id} failed for {} on {}: {err}",
                request.player,
                request.banner
            );
        }
        result
    }

    async fn run(&self, id: SessionId, request: &PullRequest) -> Result<PullOutcome, PullError> {
        let mut run = self.preflight(id, request).await?;
        let reservation = match self
            .backends
            .ledger
            .reserve(&request.player, run.cost)
            .await
        {
            Ok(reservation) => reservation,
            Err(ReserveError::InsufficientFunds {
                kind,
                required,
                available,
            }) => {
                return Err(PullError::InsufficientCurrency {
                    kind,
                    required,
                    available,
                });
            }
            Err(ReserveError::Store(source)) => {
                return Err(PullError::Persistence {
                    step: CommitStep::Reserve,
                    source,
                    refund: RefundStatus::NotNeeded,
                });
            }
        };
        let mut journal = Journal::new(id);
        match self.settle(&mut run, reservation, &mut journal).await {
            Ok(()) => Ok(self.finish(run).await),
            Err(abort) => {
                run.session.fail();
                let refund = self.roll_back(&run, journal, reservation).await;
                Err(abort.into_error(refund))
            }
        }
    }

    /// Everything that can fail without touching currency: banner lookup,
    /// pool prefetch and key locks.
    ///
    /// Locks are taken pity first, then wishlist, then the player's
    /// collection. The collection lock keeps the ownership lookup and the
    /// grants of one session apart from every other session of the player.
    async fn preflight<'a>(
        &'a self,
        id: SessionId,
        request: &'a PullRequest,
    ) -> Result<Run<'a>, PullError> {
        let banner = self.banners.require(&request.banner)?;
        banner.validate()?;
        self.config.check_draws(request.draws)?;
        let pools = self.prefetch_pools(banner).await?;
        let pity_key = PityKey::new(request.player.clone(), banner.id.clone(), banner.element);
        let pity = self.pity.lock(&pity_key).await?;
        let wishlist = match Self::wishlist_key(banner, &request.player, &request.server) {
            Some(key) => Some(self.wishlists.lock(&key).await?),
            None => None,
        };
        let collection = self
            .collections
            .acquire_within(&request.player, self.config.lock_timeout())
            .await
            .ok_or_else(|| PullError::ConcurrencyConflict {
                key: format!("collection:{}", request.player),
            })?;
        let rng = request
            .seed
            .map_or_else(RngBundle::from_entropy, RngBundle::from_seed);
        Ok(Run {
            session: PullSession::new(id),
            request,
            banner,
            pools,
            pity,
            wishlist,
            _collection: collection,
            rng,
            cost: banner.cost_for(request.draws),
            entries: Vec::new(),
        })
    }

    async fn prefetch_pools(&self, banner: &Banner) -> Result<PoolSet, PullError> {
        let mut pools = PoolSet::new();
        for rarity in banner.reachable_rarities() {
            let pool = match banner.fixed_pool.as_ref().and_then(|pool| pool.items(rarity)) {
                Some(items) => items.to_vec(),
                None => self
                    .backends
                    .catalog
                    .pool_by_rarity(&banner.id, rarity)
                    .await
                    .map_err(preflight_failure)?,
            };
            if pool.is_empty() {
                return Err(ConfigError::EmptyPool {
                    banner: banner.id.clone(),
                    rarity,
                }
                .into());
            }
            pools.insert(rarity, pool);
        }
        Ok(pools)
    }

    async fn settle(
        &self,
        run: &mut Run<'_>,
        reservation: ReservationId,
        journal: &mut Journal,
    ) -> Result<(), Abort> {
        run.session.advance(SessionPhase::CostVerified)?;
        run.session.advance(SessionPhase::Drawing)?;
        let resolutions = self.draw(run);
        run.session.advance(SessionPhase::Materializing)?;
        let entries = self.materialize(run, resolutions).await?;
        run.session.advance(SessionPhase::Committing)?;
        let timeout = self.config.commit_timeout();
        let commit = tokio::time::timeout(
            timeout,
            self.commit(run, &entries, reservation, journal),
        )
        .await;
        match commit {
            Ok(result) => result?,
            Err(_) => {
                return Err(Abort::Step {
                    step: journal.pending,
                    source: StoreError::Timeout {
                        timeout_ms: self.config.commit_timeout_ms,
                    },
                });
            }
        }
        run.session.advance(SessionPhase::Completed)?;
        run.entries = entries;
        Ok(())
    }

    /// Resolve every draw in order, threading pity and wishlist state.
    fn draw(&self, run: &mut Run<'_>) -> Vec<Resolution> {
        let at = Utc::now();
        let mut resolutions =
            Vec::with_capacity(usize::try_from(run.request.draws).unwrap_or_default());
        for _ in 0..run.request.draws {
            let resolution = self.resolver.resolve(
                run.banner,
                run.pity.state(),
                run.wishlist.as_ref().map(WishlistLease::state),
                run.rng.rarity(),
            );
            self.resolver.advance(
                &resolution,
                run.pity.state_mut(),
                run.wishlist.as_mut().map(WishlistLease::state_mut),
                at,
            );
            resolutions.push(resolution);
        }
        resolutions
    }

    async fn materialize(
        &self,
        run: &mut Run<'_>,
        resolutions: Vec<Resolution>,
    ) -> Result<Vec<PullEntry>, Abort> {
        let mut picks = Vec::with_capacity(resolutions.len());
        for resolution in &resolutions {
            let pool = run
                .pools
                .get(&resolution.rarity)
                .map_or(&[][..], Vec::as_slice);
            let item = self
                .materializer
                .pick(resolution.forced_item.as_ref(), pool, run.rng.item())
                .ok_or_else(|| {
                    Abort::Config(ConfigError::EmptyPool {
                        banner: run.banner.id.clone(),
                        rarity: resolution.rarity,
                    })
                })?;
            picks.push(item);
        }

        let mut ownership = OwnershipSnapshot::new();
        let distinct: BTreeSet<&ItemId> = picks.iter().collect();
        for item in distinct {
            let owned = self
                .backends
                .ownership
                .has(&run.request.player, item)
                .await
                .map_err(Abort::at(CommitStep::OwnershipLookup))?;
            ownership.record(item.clone(), owned);
        }

        let context = BonusContext {
            promotional: run.request.promotional,
        };
        let session = run.session.id();
        let mut entries = Vec::with_capacity(picks.len());
        for (index, (resolution, item)) in resolutions.into_iter().zip(picks).enumerate() {
            let settled = self
                .materializer
                .settle(item, resolution.rarity, &mut ownership);
            let bonus: BonusDrops = self
                .bonus
                .roll_bonus(context, run.rng.bonus())
                .into_iter()
                .collect();
            log::debug!(
                target: LOG_TARGET_DRAW,
                "{session} draw {}: {} {} via {}{}",
                index + 1,
                resolution.rarity,
                settled.item_id,
                resolution.trigger,
                if settled.is_new {
                    String::from(" (new)")
                } else {
                    format!(" (+{} fragments)", settled.fragments_granted)
                }
            );
            entries.push(PullEntry {
                item_id: settled.item_id,
                rarity: resolution.rarity,
                is_new: settled.is_new,
                fragments_granted: settled.fragments_granted,
                is_wishlist_hit: resolution.wishlist_hit,
                trigger: resolution.trigger,
                bonus,
            });
        }
        Ok(entries)
    }

    /// Apply every effect of the session, committing the ledger last.
    async fn commit(
        &self,
        run: &Run<'_>,
        entries: &[PullEntry],
        reservation: ReservationId,
        journal: &mut Journal,
    ) -> Result<(), Abort> {
        let player = &run.request.player;
        let ownership = &self.backends.ownership;

        journal.pending = CommitStep::SavePity;
        journal.applied.push(Applied::Pity);
        run.pity
            .persist()
            .await
            .map_err(Abort::at(CommitStep::SavePity))?;

        if let Some(wishlist) = &run.wishlist {
            journal.pending = CommitStep::SaveWishlist;
            journal.applied.push(Applied::Wishlist);
            wishlist
                .persist()
                .await
                .map_err(Abort::at(CommitStep::SaveWishlist))?;
        }

        for entry in entries {
            if entry.is_new {
                journal.pending = CommitStep::GrantItem;
                journal.applied.push(Applied::Item(entry.item_id.clone()));
                ownership
                    .grant(player, &entry.item_id)
                    .await
                    .map_err(Abort::at(CommitStep::GrantItem))?;
            } else if entry.fragments_granted > 0 {
                journal.pending = CommitStep::GrantFragments;
                let grant = journal.next_grant();
                journal.applied.push(Applied::Fragments(
                    entry.item_id.clone(),
                    entry.fragments_granted,
                    grant,
                ));
                ownership
                    .grant_fragments(player, &entry.item_id, entry.fragments_granted, grant)
                    .await
                    .map_err(Abort::at(CommitStep::GrantFragments))?;
            }
            for drop in &entry.bonus {
                journal.pending = CommitStep::CreditBonus;
                let grant = journal.next_grant();
                journal.applied.push(Applied::Credit(*drop, grant));
                self.backends
                    .ledger
                    .credit(player, *drop, grant)
                    .await
                    .map_err(Abort::at(CommitStep::CreditBonus))?;
            }
        }

        journal.pending = CommitStep::CommitLedger;
        self.backends
            .ledger
            .commit(reservation)
            .await
            .map_err(Abort::at(CommitStep::CommitLedger))
    }

    /// Undo journaled effects in reverse, then release the reservation.
    async fn roll_back(
        &self,
        run: &Run<'_>,
        journal: Journal,
        reservation: ReservationId,
    ) -> RefundStatus {
        let session = run.session.id();
        let player = &run.request.player;
        if !journal.applied.is_empty() {
            log::warn!(
                target: LOG_TARGET_COMMIT,
                "{session} compensating {} applied steps",
                journal.applied.len()
            );
        }
        for applied in journal.applied.iter().rev() {
            let undone = match applied {
                Applied::Pity => run.pity.restore().await,
                Applied::Wishlist => match &run.wishlist {
                    Some(wishlist) => wishlist.restore().await,
                    None => Ok(()),
                },
                Applied::Item(item) => self.backends.ownership.revoke(player, item).await,
                Applied::Fragments(item, amount, grant) => {
                    self.backends
                        .ownership
                        .revoke_fragments(player, item, *amount, *grant)
                        .await
                }
                Applied::Credit(amount, grant) => {
                    self.backends.ledger.debit(player, *amount, *grant).await
                }
            };
            if let Err(err) = undone {
                log::error!(
                    target: LOG_TARGET_COMMIT,
                    "{session} could not undo {applied:?} for {player}: {err}"
                );
            }
        }
        match self.backends.ledger.release(reservation).await {
            Ok(()) => {
                log::warn!(
                    target: LOG_TARGET_COMMIT,
                    "{session} released {reservation} ({}) for {player}",
                    run.cost
                );
                RefundStatus::Refunded
            }
            Err(err) => {
                log::error!(
                    target: LOG_TARGET_COMMIT,
                    "{session} refund of {reservation} ({}) for {player} failed: {err}; manual reconciliation required",
                    run.cost
                );
                RefundStatus::RefundFailed
            }
        }
    }

    async fn finish(&self, run: Run<'_>) -> PullOutcome {
        let Run {
            session,
            request,
            banner,
            rng,
            cost,
            entries,
            ..
        } = run;
        let record = PullRecord {
            session_id: session.id(),
            player: request.player.clone(),
            server: request.server.clone(),
            banner: banner.id.clone(),
            pull_type: PullType::from_draws(request.draws),
            entries,
            cost,
            seed: rng.seed(),
            rng_usage: rng.usage(),
            created_at: Utc::now(),
            digest: 0,
        };
        let record = seal_for_history(record);
        let history_recorded = self.history.record(&record).await.is_ok();
        log::info!(
            target: LOG_TARGET_SESSION,
            "{} completed: {} draws on {} for {} ({} charged, {} legendary)",
            session.id(),
            record.entries.len(),
            record.banner,
            record.player,
            record.cost,
            record
                .entries
                .iter()
                .filter(|entry| entry.rarity == Rarity::Legendary)
                .count()
        );
        PullOutcome {
            record,
            trace: session.trace().to_vec(),
            history_recorded,
        }
    }
}

/// Seal a finished record. One that cannot be serialized is stored unsealed,
/// never verifies, and is counted as tampered by every audit.
fn seal_for_history(record: PullRecord) -> PullRecord {
    let session = record.session_id;
    record.clone().seal().unwrap_or_else(|err| {
        log::error!(
            target: LOG_TARGET_SESSION,
            "{session} record stored unsealed and will fail digest verification: {err}"
        );
        record
    })
}
