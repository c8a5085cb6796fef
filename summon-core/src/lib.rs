//! Summon Engine
//!
//! Platform-agnostic loot-acquisition core for gacha-style collection games:
//! weighted rarity draws, hard pity floors, player wishlists and atomic,
//! auditable pull sessions. Storage, currency and the item catalog are
//! reached through the traits in [`backend`].

pub mod backend;
pub mod banner;
pub mod bonus;
pub mod config;
pub mod constants;
pub mod currency;
pub mod error;
pub mod history;
pub mod ids;
pub mod locks;
pub mod materializer;
pub mod memory;
pub mod numbers;
pub mod pity;
pub mod rarity;
pub mod resolver;
pub mod rng;
pub mod session;
pub mod wishlist;

// Re-export commonly used types
pub use backend::{
    CatalogLookup, CurrencyLedger, HistorySink, OwnershipStore, PityRepository,
    WishlistRepository,
};
pub use banner::{Banner, BannerCatalog, BannerType, FixedPool, PityThresholds, PullCost};
pub use bonus::{BonusContext, BonusDropConfig, BonusDropRoller, BonusReward};
pub use config::EngineConfig;
pub use currency::{CurrencyAmount, CurrencyKind};
pub use error::{
    CommitStep, ConfigError, ParseEnumError, PullError, RefundStatus, ReserveError, StoreError,
    TransitionError, WishlistError,
};
pub use history::{BonusDrops, HistoryRecorder, HistoryStats, PullEntry, PullRecord, PullType};
pub use ids::{BannerId, GrantKey, ItemId, PlayerId, ReservationId, ServerId, SessionId};
pub use locks::{KeyGuard, KeyedLocks};
pub use materializer::{FragmentTable, ItemMaterializer, Materialized, OwnershipSnapshot};
pub use memory::{
    Faults, MemoryBackends, MemoryCatalog, MemoryHistory, MemoryLedger, MemoryOwnership,
    MemoryPityRepository, MemoryWishlistRepository,
};
pub use pity::{PityCounterStore, PityKey, PityLease, PityState};
pub use rarity::{Element, Rarity, RarityTable};
pub use resolver::{RarityResolver, Resolution, ResolutionTrigger};
pub use rng::{CountingRng, RngBundle, RngUsage};
pub use session::{Backends, PullOutcome, PullRequest, PullService, PullSession, SessionPhase};
pub use wishlist::{WishlistKey, WishlistLease, WishlistLimits, WishlistState, WishlistStore};
