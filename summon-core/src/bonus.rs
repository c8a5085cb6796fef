//! Independent side roll paying out secondary currency.
use crate::constants::{DEFAULT_BONUS_CHANCE, DEFAULT_BONUS_PROMO_CHANCE};
use crate::currency::{CurrencyAmount, CurrencyKind};
use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One possible bonus payout and its relative weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusReward {
    pub kind: CurrencyKind,
    pub quantity: u64,
    #[serde(default = "BonusReward::default_weight")]
    pub weight: u32,
}

impl BonusReward {
    const fn default_weight() -> u32 {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusDropConfig {
    /// Per-draw chance outside promotions.
    #[serde(default = "BonusDropConfig::default_chance")]
    pub chance: f64,
    /// Per-draw chance while a promotional window is open.
    #[serde(default = "BonusDropConfig::default_promo_chance")]
    pub promo_chance: f64,
    #[serde(default = "BonusDropConfig::default_rewards")]
    pub rewards: Vec<BonusReward>,
}

impl Default for BonusDropConfig {
    fn default() -> Self {
        Self {
            chance: Self::default_chance(),
            promo_chance: Self::default_promo_chance(),
            rewards: Self::default_rewards(),
        }
    }
}

impl BonusDropConfig {
    const fn default_chance() -> f64 {
        DEFAULT_BONUS_CHANCE
    }

    const fn default_promo_chance() -> f64 {
        DEFAULT_BONUS_PROMO_CHANCE
    }

    fn default_rewards() -> Vec<BonusReward> {
        vec![
            BonusReward {
                kind: CurrencyKind::Dust,
                quantity: 50,
                weight: 70,
            },
            BonusReward {
                kind: CurrencyKind::Gold,
                quantity: 5_000,
                weight: 25,
            },
            BonusReward {
                kind: CurrencyKind::SummonScroll,
                quantity: 1,
                weight: 5,
            },
        ]
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when a chance is outside `[0, 1]` or no reward
    /// carries weight.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("bonus.chance", self.chance),
            ("bonus.promo_chance", self.promo_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RangeViolation {
                    field,
                    min: 0.0,
                    max: 1.0,
                    value,
                });
            }
        }
        if self.rewards.iter().all(|reward| reward.weight == 0) {
            return Err(ConfigError::EmptyBonusRewards);
        }
        Ok(())
    }
}

/// Conditions of the draw the bonus is rolled for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BonusContext {
    pub promotional: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BonusDropRoller {
    config: BonusDropConfig,
}

impl BonusDropRoller {
    #[must_use]
    pub const fn new(config: BonusDropConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn chance(&self, context: BonusContext) -> f64 {
        if context.promotional {
            self.config.promo_chance
        } else {
            self.config.chance
        }
    }

    /// Roll once for a draw. The result is additive to the main reward.
    pub fn roll_bonus<R: Rng>(&self, context: BonusContext, rng: &mut R) -> Vec<CurrencyAmount> {
        let chance = self.chance(context).clamp(0.0, 1.0);
        if !rng.gen_bool(chance) {
            return Vec::new();
        }
        self.pick_reward(rng)
            .map(|reward| CurrencyAmount::new(reward.kind, reward.quantity))
            .into_iter()
            .collect()
    }

    fn pick_reward<R: Rng>(&self, rng: &mut R) -> Option<&BonusReward> {
        let total: u32 = self.config.rewards.iter().map(|reward| reward.weight).sum();
        if total == 0 {
            return None;
        }
        let roll = rng.gen_range(0..total);
        let mut current = 0;
        for reward in &self.config.rewards {
            current += reward.weight;
            if roll < current {
                return Some(reward);
            }
        }
        self.config.rewards.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    const SAMPLE_SIZE: u32 = 20_000;
    const TOLERANCE: f64 = 0.01;

    fn hit_rate(roller: &BonusDropRoller, context: BonusContext, seed: u64) -> f64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let hits = (0..SAMPLE_SIZE)
            .filter(|_| !roller.roll_bonus(context, &mut rng).is_empty())
            .count();
        f64::from(u32::try_from(hits).expect("count fits")) / f64::from(SAMPLE_SIZE)
    }

    #[test]
    fn baseline_and_promo_rates_track_config() {
        let roller = BonusDropRoller::default();
        let base = hit_rate(&roller, BonusContext::default(), 0xB0B);
        let promo = hit_rate(&roller, BonusContext { promotional: true }, 0xB0B);
        assert!((base - DEFAULT_BONUS_CHANCE).abs() <= TOLERANCE, "base {base}");
        assert!(
            (promo - DEFAULT_BONUS_PROMO_CHANCE).abs() <= TOLERANCE,
            "promo {promo}"
        );
    }

    #[test]
    fn certain_drop_pays_weighted_reward() {
        let roller = BonusDropRoller::new(BonusDropConfig {
            chance: 1.0,
            promo_chance: 1.0,
            rewards: vec![
                BonusReward {
                    kind: CurrencyKind::Dust,
                    quantity: 10,
                    weight: 0,
                },
                BonusReward {
                    kind: CurrencyKind::Gold,
                    quantity: 100,
                    weight: 3,
                },
            ],
        });
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..100 {
            assert_eq!(
                roller.roll_bonus(BonusContext::default(), &mut rng),
                vec![CurrencyAmount::new(CurrencyKind::Gold, 100)]
            );
        }
    }

    #[test]
    fn zero_chance_never_drops() {
        let roller = BonusDropRoller::new(BonusDropConfig {
            chance: 0.0,
            ..BonusDropConfig::default()
        });
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(
            (0..1000).all(|_| roller.roll_bonus(BonusContext::default(), &mut rng).is_empty())
        );
    }

    #[test]
    fn validate_rejects_out_of_range_chance_and_weightless_rewards() {
        let bad_chance = BonusDropConfig {
            promo_chance: 1.5,
            ..BonusDropConfig::default()
        };
        assert!(matches!(
            bad_chance.validate(),
            Err(ConfigError::RangeViolation {
                field: "bonus.promo_chance",
                ..
            })
        ));
        let no_rewards = BonusDropConfig {
            rewards: Vec::new(),
            ..BonusDropConfig::default()
        };
        assert_eq!(no_rewards.validate(), Err(ConfigError::EmptyBonusRewards));
        assert!(BonusDropConfig::default().validate().is_ok());
    }
}
