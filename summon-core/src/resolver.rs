//! Decides the rarity of each draw from pity, wishlist and the rarity table.
use crate::banner::Banner;
use crate::ids::ItemId;
use crate::pity::PityState;
use crate::rarity::Rarity;
use crate::wishlist::WishlistState;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rule decided a draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ResolutionTrigger {
    Weighted { roll: f64 },
    LegendaryPity,
    EpicPity,
    Wishlist,
}

impl fmt::Display for ResolutionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weighted { roll } => write!(f, "weighted({roll:.3})"),
            Self::LegendaryPity => f.write_str("legendary pity"),
            Self::EpicPity => f.write_str("epic pity"),
            Self::Wishlist => f.write_str("wishlist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub rarity: Rarity,
    /// Set only for wishlist hits.
    pub forced_item: Option<ItemId>,
    pub wishlist_hit: bool,
    pub trigger: ResolutionTrigger,
}

impl Resolution {
    const fn rolled(rarity: Rarity, trigger: ResolutionTrigger) -> Self {
        Self {
            rarity,
            forced_item: None,
            wishlist_hit: false,
            trigger,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RarityResolver;

impl RarityResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolve one draw against the current counters.
    ///
    /// A due wishlist overrides every other rule. Then the Legendary floor, the
    /// Epic floor and finally a weighted roll over the banner's table.
    pub fn resolve<R: Rng>(
        &self,
        banner: &Banner,
        pity: &PityState,
        wishlist: Option<&WishlistState>,
        rng: &mut R,
    ) -> Resolution {
        if let Some(wishlist) = wishlist
            && wishlist.is_due()
            && let Some(hero) = wishlist.pick(rng)
        {
            return Resolution {
                rarity: Rarity::Legendary,
                forced_item: Some(hero.clone()),
                wishlist_hit: true,
                trigger: ResolutionTrigger::Wishlist,
            };
        }
        if pity.pulls_since_legendary.saturating_add(1) >= banner.pity.legendary {
            return Resolution::rolled(Rarity::Legendary, ResolutionTrigger::LegendaryPity);
        }
        if pity.pulls_since_epic.saturating_add(1) >= banner.pity.epic {
            return Resolution::rolled(Rarity::Epic, ResolutionTrigger::EpicPity);
        }
        let (rarity, roll) = banner.rates.roll(rng);
        Resolution::rolled(rarity, ResolutionTrigger::Weighted { roll })
    }

    /// Thread counters into the next draw of the same session.
    pub fn advance(
        &self,
        resolution: &Resolution,
        pity: &mut PityState,
        wishlist: Option<&mut WishlistState>,
        at: DateTime<Utc>,
    ) {
        pity.register_draw(resolution.rarity, at);
        if let Some(wishlist) = wishlist {
            if resolution.wishlist_hit {
                wishlist.reset_pity();
            } else {
                wishlist.increment_pity();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::{BannerType, PityThresholds, PullCost};
    use crate::currency::CurrencyKind;
    use crate::ids::BannerId;
    use crate::rarity::RarityTable;
    use crate::wishlist::WishlistLimits;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn banner() -> Banner {
        Banner {
            id: BannerId::new("standard"),
            name: String::from("Standard"),
            kind: BannerType::Standard,
            rates: RarityTable::default(),
            pity: PityThresholds::default(),
            cost: PullCost {
                kind: CurrencyKind::Gems,
                single: 300,
                bundle: Some(2_700),
            },
            element: None,
            fixed_pool: None,
            wishlist: None,
        }
    }

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::from_seed([11u8; 32])
    }

    #[test]
    fn legendary_floor_fires_on_ninetieth_draw() {
        let pity = PityState {
            pulls_since_legendary: 89,
            pulls_since_epic: 3,
            ..PityState::default()
        };
        let resolution = RarityResolver::new().resolve(&banner(), &pity, None, &mut rng());
        assert_eq!(resolution.rarity, Rarity::Legendary);
        assert_eq!(resolution.trigger, ResolutionTrigger::LegendaryPity);
        assert!(!resolution.wishlist_hit);
    }

    #[test]
    fn epic_floor_fires_below_legendary_floor() {
        let pity = PityState {
            pulls_since_legendary: 40,
            pulls_since_epic: 9,
            ..PityState::default()
        };
        let resolution = RarityResolver::new().resolve(&banner(), &pity, None, &mut rng());
        assert_eq!(resolution.rarity, Rarity::Epic);
        assert_eq!(resolution.trigger, ResolutionTrigger::EpicPity);
    }

    #[test]
    fn due_wishlist_forces_member_and_overrides_pity() {
        let mut wishlist = WishlistState::new(WishlistLimits::default());
        wishlist.push(ItemId::new("aurora")).unwrap();
        wishlist.push(ItemId::new("blaze")).unwrap();
        wishlist.pity_counter = 99;
        let pity = PityState {
            pulls_since_epic: 9,
            ..PityState::default()
        };
        let resolver = RarityResolver::new();
        let resolution = resolver.resolve(&banner(), &pity, Some(&wishlist), &mut rng());
        assert_eq!(resolution.rarity, Rarity::Legendary);
        assert!(resolution.wishlist_hit);
        let forced = resolution.forced_item.clone().unwrap();
        assert!(wishlist.contains(&forced));

        let mut pity = pity;
        resolver.advance(&resolution, &mut pity, Some(&mut wishlist), Utc::now());
        assert_eq!(wishlist.pity_counter, 0);
        assert_eq!(pity.pulls_since_legendary, 0);
        assert!(pity.has_received_legendary);
    }

    #[test]
    fn empty_wishlist_never_overrides() {
        let mut wishlist = WishlistState::new(WishlistLimits::default());
        wishlist.pity_counter = 150;
        let resolution = RarityResolver::new().resolve(
            &banner(),
            &PityState::default(),
            Some(&wishlist),
            &mut rng(),
        );
        assert!(!resolution.wishlist_hit);
        assert!(matches!(
            resolution.trigger,
            ResolutionTrigger::Weighted { .. }
        ));
    }

    #[test]
    fn legendary_pity_hit_is_not_a_wishlist_hit() {
        let resolver = RarityResolver::new();
        let mut wishlist = WishlistState::new(WishlistLimits::default());
        wishlist.push(ItemId::new("aurora")).unwrap();
        wishlist.pity_counter = 10;
        let mut pity = PityState {
            pulls_since_legendary: 89,
            ..PityState::default()
        };
        let resolution = resolver.resolve(&banner(), &pity, Some(&wishlist), &mut rng());
        assert_eq!(resolution.trigger, ResolutionTrigger::LegendaryPity);
        resolver.advance(&resolution, &mut pity, Some(&mut wishlist), Utc::now());
        assert_eq!(wishlist.pity_counter, 11);
    }

    #[test]
    fn threaded_draws_never_exceed_floors() {
        let resolver = RarityResolver::new();
        let banner = Banner {
            rates: RarityTable::new(100.0, 0.0, 0.0, 0.0),
            ..banner()
        };
        let mut pity = PityState::default();
        let mut rng = rng();
        let mut since_legendary = 0;
        let mut since_epic = 0;
        for _ in 0..1_000 {
            let resolution = resolver.resolve(&banner, &pity, None, &mut rng);
            resolver.advance(&resolution, &mut pity, None, Utc::now());
            since_legendary += 1;
            since_epic += 1;
            match resolution.rarity {
                Rarity::Legendary => {
                    assert!(since_legendary <= 90);
                    since_legendary = 0;
                    since_epic = 0;
                }
                Rarity::Epic => {
                    assert!(since_epic <= 10);
                    since_epic = 0;
                }
                Rarity::Common | Rarity::Rare => {}
            }
        }
        assert_eq!(pity.total_pulls, 1_000);
    }
}
