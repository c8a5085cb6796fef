//! Banner definitions: rarity table, pity thresholds, cost and restrictions.
use crate::constants::{BUNDLE_DRAW_COUNT, DEFAULT_EPIC_PITY, DEFAULT_LEGENDARY_PITY};
use crate::currency::{CurrencyAmount, CurrencyKind};
use crate::error::ConfigError;
use crate::ids::{BannerId, ItemId};
use crate::rarity::{Element, Rarity, RarityTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerType {
    Standard,
    Limited,
    Ticket,
    Elemental,
}

impl BannerType {
    /// Whether draws on this banner family advance the wishlist by default.
    #[must_use]
    pub const fn default_wishlist(self) -> bool {
        matches!(self, Self::Standard | Self::Elemental)
    }
}

/// Hard pity floors. A value of `n` guarantees the tier on the `n`-th draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PityThresholds {
    #[serde(default = "PityThresholds::default_legendary")]
    pub legendary: u32,
    #[serde(default = "PityThresholds::default_epic")]
    pub epic: u32,
}

impl Default for PityThresholds {
    fn default() -> Self {
        Self {
            legendary: Self::default_legendary(),
            epic: Self::default_epic(),
        }
    }
}

impl PityThresholds {
    const fn default_legendary() -> u32 {
        DEFAULT_LEGENDARY_PITY
    }

    const fn default_epic() -> u32 {
        DEFAULT_EPIC_PITY
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.legendary < 1 {
            return Err(ConfigError::MinViolation {
                field: "pity.legendary",
                min: 1,
                value: u64::from(self.legendary),
            });
        }
        if self.epic < 1 {
            return Err(ConfigError::MinViolation {
                field: "pity.epic",
                min: 1,
                value: u64::from(self.epic),
            });
        }
        Ok(())
    }
}

/// Price of a single draw and the optional discounted ten-draw bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullCost {
    pub kind: CurrencyKind,
    pub single: u64,
    #[serde(default)]
    pub bundle: Option<u64>,
}

impl PullCost {
    /// Total charge for `draws` draws.
    #[must_use]
    pub fn total_for(&self, draws: u32) -> CurrencyAmount {
        let amount = match self.bundle {
            Some(bundle) if draws == BUNDLE_DRAW_COUNT => bundle,
            _ => self.single.saturating_mul(u64::from(draws)),
        };
        CurrencyAmount::new(self.kind, amount)
    }
}

/// Explicit per-rarity item list replacing the catalog pool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPool(pub BTreeMap<Rarity, Vec<ItemId>>);

impl FixedPool {
    #[must_use]
    pub fn items(&self, rarity: Rarity) -> Option<&[ItemId]> {
        self.0.get(&rarity).map(Vec::as_slice)
    }
}

/// Immutable, admin-authored banner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub id: BannerId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BannerType,
    #[serde(default)]
    pub rates: RarityTable,
    #[serde(default)]
    pub pity: PityThresholds,
    pub cost: PullCost,
    #[serde(default)]
    pub element: Option<Element>,
    #[serde(default)]
    pub fixed_pool: Option<FixedPool>,
    /// Overrides the banner-type default for wishlist participation.
    #[serde(default)]
    pub wishlist: Option<bool>,
}

impl Banner {
    /// Validate weights, thresholds and restrictions.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rates.validate()?;
        self.pity.validate()?;
        if self.cost.single == 0 {
            return Err(ConfigError::MinViolation {
                field: "cost.single",
                min: 1,
                value: 0,
            });
        }
        if self.kind == BannerType::Elemental && self.element.is_none() {
            return Err(ConfigError::MissingElement(self.id.clone()));
        }
        if let Some(pool) = &self.fixed_pool {
            for rarity in self.reachable_rarities() {
                if pool.items(rarity).is_none_or(<[ItemId]>::is_empty) {
                    return Err(ConfigError::EmptyPool {
                        banner: self.id.clone(),
                        rarity,
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn uses_wishlist(&self) -> bool {
        self.wishlist.unwrap_or_else(|| self.kind.default_wishlist())
    }

    /// Rarities a draw on this banner can land on, including pity floors.
    #[must_use]
    pub fn reachable_rarities(&self) -> Vec<Rarity> {
        let mut rarities: Vec<Rarity> = self.rates.reachable().collect();
        for forced in [Rarity::Epic, Rarity::Legendary] {
            if !rarities.contains(&forced) {
                rarities.push(forced);
            }
        }
        rarities.sort();
        rarities
    }

    #[must_use]
    pub fn cost_for(&self, draws: u32) -> CurrencyAmount {
        self.cost.total_for(draws)
    }
}

/// Set of banners loaded from configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BannerCatalog {
    pub banners: Vec<Banner>,
}

impl BannerCatalog {
    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or any banner is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate every banner and id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for banner in &self.banners {
            if !seen.insert(&banner.id) {
                return Err(ConfigError::DuplicateBanner(banner.id.clone()));
            }
            banner.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &BannerId) -> Option<&Banner> {
        self.banners.iter().find(|banner| &banner.id == id)
    }

    /// Look up a banner, treating a missing id as a configuration error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownBanner`.
    pub fn require(&self, id: &BannerId) -> Result<&Banner, ConfigError> {
        self.get(id)
            .ok_or_else(|| ConfigError::UnknownBanner(id.clone()))
    }
}
