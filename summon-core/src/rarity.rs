//! Rarity tiers, elements and the weighted rarity table.
use crate::constants::{RARITY_WEIGHT_TOLERANCE, RARITY_WEIGHT_TOTAL};
use crate::error::{ConfigError, ParseEnumError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rarity tier of a catalog item, in ascending order of scarcity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// All tiers in declared order; weighted draws bucket in this order.
    pub const ALL: [Self; 4] = [Self::Common, Self::Rare, Self::Epic, Self::Legendary];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Rarity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rarity| rarity.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("rarity", s))
    }
}

/// Hero element, used by elemental banners and elemental wishlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Fire,
    Water,
    Earth,
    Light,
    Dark,
}

impl Element {
    pub const ALL: [Self; 5] = [Self::Fire, Self::Water, Self::Earth, Self::Light, Self::Dark];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::Water => "water",
            Self::Earth => "earth",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Element {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|element| element.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("element", s))
    }
}

/// Percentage weights per rarity. Weights add up to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarityTable {
    #[serde(default)]
    pub common: f64,
    #[serde(default)]
    pub rare: f64,
    #[serde(default)]
    pub epic: f64,
    #[serde(default)]
    pub legendary: f64,
}

impl Default for RarityTable {
    fn default() -> Self {
        Self {
            common: 50.0,
            rare: 30.0,
            epic: 15.0,
            legendary: 5.0,
        }
    }
}

impl RarityTable {
    #[must_use]
    pub const fn new(common: f64, rare: f64, epic: f64, legendary: f64) -> Self {
        Self {
            common,
            rare,
            epic,
            legendary,
        }
    }

    #[must_use]
    pub const fn weight(&self, rarity: Rarity) -> f64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }

    /// Configured long-run probability of a rarity in `[0, 1]`.
    #[must_use]
    pub fn probability(&self, rarity: Rarity) -> f64 {
        self.weight(rarity) / RARITY_WEIGHT_TOTAL
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        Rarity::ALL.iter().map(|rarity| self.weight(*rarity)).sum()
    }

    /// Validate that every weight is finite and non-negative and the total is 100.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidWeight` or `ConfigError::WeightTotal`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rarity in Rarity::ALL {
            let value = self.weight(rarity);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { rarity, value });
            }
        }
        let total = self.total();
        if (total - RARITY_WEIGHT_TOTAL).abs() > RARITY_WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightTotal { total });
        }
        Ok(())
    }

    /// Rarities a weighted draw can produce.
    pub fn reachable(&self) -> impl Iterator<Item = Rarity> + '_ {
        Rarity::ALL
            .into_iter()
            .filter(|rarity| self.weight(*rarity) > 0.0)
    }

    /// Map a sample in `[0, 100)` onto a rarity by cumulative-sum bucketing.
    #[must_use]
    pub fn bucket(&self, roll: f64) -> Rarity {
        let mut cumulative = 0.0;
        for rarity in Rarity::ALL {
            let weight = self.weight(rarity);
            cumulative += weight;
            if weight > 0.0 && roll < cumulative {
                return rarity;
            }
        }
        // Float drift at the top edge lands on the last non-zero bucket.
        Rarity::ALL
            .into_iter()
            .rev()
            .find(|rarity| self.weight(*rarity) > 0.0)
            .unwrap_or(Rarity::Common)
    }

    /// Draw a rarity, returning it together with the sampled roll.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> (Rarity, f64) {
        let roll = rng.gen_range(0.0..RARITY_WEIGHT_TOTAL);
        (self.bucket(roll), roll)
    }
}
