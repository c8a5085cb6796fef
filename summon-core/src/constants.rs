//! Centralized tuning constants for the summon engine.
//!
//! These values define the default math for banners, wishlists and sessions.
//! Operators override most of them through `EngineConfig`; the ones that stay
//! here are structural and only change through reviewed code.

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_TARGET_SESSION: &str = "summon::session";
pub(crate) const LOG_TARGET_DRAW: &str = "summon::draw";
pub(crate) const LOG_TARGET_COMMIT: &str = "summon::commit";
pub(crate) const LOG_TARGET_HISTORY: &str = "summon::history";
pub(crate) const LOG_TARGET_WISHLIST: &str = "summon::wishlist";

// Rarity tables ------------------------------------------------------------
/// Rarity weights are percentages and must add up to this total.
pub const RARITY_WEIGHT_TOTAL: f64 = 100.0;
/// Accepted drift when validating that weights add up to 100.
pub const RARITY_WEIGHT_TOLERANCE: f64 = 1e-6;

// Pity ---------------------------------------------------------------------
pub const DEFAULT_LEGENDARY_PITY: u32 = 90;
pub const DEFAULT_EPIC_PITY: u32 = 10;

// Wishlist -----------------------------------------------------------------
pub const DEFAULT_WISHLIST_MAX_HEROES: usize = 4;
/// Wishlist guarantee fires on this pull since the last hit.
pub const DEFAULT_WISHLIST_THRESHOLD: u32 = 100;

// Fragments granted when a drawn hero is already owned --------------------
pub const FRAGMENTS_COMMON: u32 = 1;
pub const FRAGMENTS_RARE: u32 = 5;
pub const FRAGMENTS_EPIC: u32 = 20;
pub const FRAGMENTS_LEGENDARY: u32 = 50;

// Bonus drops --------------------------------------------------------------
pub const DEFAULT_BONUS_CHANCE: f64 = 0.05;
pub const DEFAULT_BONUS_PROMO_CHANCE: f64 = 0.15;

// Sessions -----------------------------------------------------------------
pub const BUNDLE_DRAW_COUNT: u32 = 10;
pub const DEFAULT_MAX_DRAWS_PER_SESSION: u32 = 10;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 5_000;

// RNG domain tags ----------------------------------------------------------
pub(crate) const RNG_DOMAIN_RARITY: &[u8] = b"summon.rarity";
pub(crate) const RNG_DOMAIN_ITEM: &[u8] = b"summon.item";
pub(crate) const RNG_DOMAIN_BONUS: &[u8] = b"summon.bonus";

#[cfg(test)]
pub(crate) const FLOAT_EPSILON: f64 = 1e-9;
