//! Engine-wide settings loaded from JSON.
use crate::bonus::BonusDropConfig;
use crate::constants::{
    DEFAULT_COMMIT_TIMEOUT_MS, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_DRAWS_PER_SESSION,
};
use crate::error::ConfigError;
use crate::materializer::FragmentTable;
use crate::wishlist::WishlistLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Longest wait for a pity or wishlist key held by another session.
    #[serde(default = "EngineConfig::default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Upper bound for the whole commit phase.
    #[serde(default = "EngineConfig::default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,
    #[serde(default = "EngineConfig::default_max_draws")]
    pub max_draws_per_session: u32,
    #[serde(default)]
    pub fragments: FragmentTable,
    #[serde(default)]
    pub bonus: BonusDropConfig,
    #[serde(default)]
    pub wishlist: WishlistLimits,
    #[serde(default)]
    pub elemental_wishlist: WishlistLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: Self::default_lock_timeout_ms(),
            commit_timeout_ms: Self::default_commit_timeout_ms(),
            max_draws_per_session: Self::default_max_draws(),
            fragments: FragmentTable::default(),
            bonus: BonusDropConfig::default(),
            wishlist: WishlistLimits::default(),
            elemental_wishlist: WishlistLimits::default(),
        }
    }
}

impl EngineConfig {
    const fn default_lock_timeout_ms() -> u64 {
        DEFAULT_LOCK_TIMEOUT_MS
    }

    const fn default_commit_timeout_ms() -> u64 {
        DEFAULT_COMMIT_TIMEOUT_MS
    }

    const fn default_max_draws() -> u32 {
        DEFAULT_MAX_DRAWS_PER_SESSION
    }

    /// Parse and validate settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("lock_timeout_ms", self.lock_timeout_ms),
            ("commit_timeout_ms", self.commit_timeout_ms),
            ("max_draws_per_session", u64::from(self.max_draws_per_session)),
        ] {
            if value == 0 {
                return Err(ConfigError::MinViolation {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        self.bonus.validate()?;
        self.wishlist.validate("wishlist")?;
        self.elemental_wishlist.validate("elemental_wishlist")?;
        Ok(())
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    #[must_use]
    pub const fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::DrawCount` unless `1 <= draws <= max_draws_per_session`.
    pub const fn check_draws(&self, draws: u32) -> Result<(), ConfigError> {
        if draws == 0 || draws > self.max_draws_per_session {
            return Err(ConfigError::DrawCount {
                requested: draws,
                max: self.max_draws_per_session,
            });
        }
        Ok(())
    }
}
