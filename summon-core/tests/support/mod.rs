#![allow(dead_code)]

use std::sync::Arc;
use summon_core::{
    BannerCatalog, BannerId, CurrencyAmount, CurrencyKind, Element, EngineConfig, MemoryBackends,
    MemoryCatalog, PlayerId, PullRequest, PullService, Rarity, ServerId,
};

pub const STANDARD: &str = "standard";
pub const FLAT: &str = "flat";
pub const TRAINING: &str = "training";
pub const DRILL: &str = "drill";
pub const INFERNO: &str = "inferno";
pub const SERVER: &str = "s1";

pub const BANNERS_JSON: &str = r#"{
    "banners": [
        {
            "id": "standard",
            "name": "Standard Summon",
            "type": "standard",
            "rates": { "common": 50, "rare": 30, "epic": 15, "legendary": 5 },
            "pity": { "legendary": 90, "epic": 10 },
            "cost": { "kind": "gems", "single": 300, "bundle": 2700 }
        },
        {
            "id": "flat",
            "name": "Flat Odds",
            "type": "limited",
            "rates": { "common": 60, "rare": 25, "epic": 10, "legendary": 5 },
            "pity": { "legendary": 1000000, "epic": 1000000 },
            "cost": { "kind": "gold", "single": 1 }
        },
        {
            "id": "training",
            "name": "Training Grounds",
            "type": "ticket",
            "rates": { "common": 100 },
            "cost": { "kind": "summon_scroll", "single": 1 },
            "fixed_pool": {
                "common": ["slime"],
                "epic": ["knight"],
                "legendary": ["aurora"]
            }
        },
        {
            "id": "drill",
            "name": "Drill Yard",
            "type": "ticket",
            "rates": { "common": 100 },
            "cost": { "kind": "summon_scroll", "single": 1 },
            "fixed_pool": {
                "common": ["slime"],
                "epic": ["knight"],
                "legendary": ["aurora"]
            }
        },
        {
            "id": "inferno",
            "name": "Inferno Gate",
            "type": "elemental",
            "element": "fire",
            "cost": { "kind": "elemental_scroll", "single": 1 }
        }
    ]
}"#;

pub fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_items(Rarity::Common, &["slime", "goblin", "bat", "rat"])
        .with_items(Rarity::Rare, &["archer", "monk", "rogue"])
        .with_items(Rarity::Epic, &["knight", "mage", "priest"])
        .with_items(Rarity::Legendary, &["aurora", "blaze", "cinder", "dusk"])
        .with_hero("cinderling", Rarity::Common, Element::Fire)
        .with_hero("flamecaller", Rarity::Rare, Element::Fire)
        .with_hero("pyromancer", Rarity::Epic, Element::Fire)
        .with_hero("phoenix", Rarity::Legendary, Element::Fire)
        .with_banner_element(&BannerId::new(INFERNO), Element::Fire)
}

pub fn banners() -> BannerCatalog {
    BannerCatalog::from_json(BANNERS_JSON).expect("valid banner fixture")
}

pub fn player(name: &str) -> PlayerId {
    PlayerId::new(name)
}

pub fn server() -> ServerId {
    ServerId::new(SERVER)
}

/// Engine settings with bonus drops switched off, so ledger balances are exact.
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.bonus.chance = 0.0;
    config.bonus.promo_chance = 0.0;
    config
}

pub struct Harness {
    pub service: Arc<PullService>,
    pub backends: MemoryBackends,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_catalog(config, catalog())
    }

    pub fn with_catalog(config: EngineConfig, catalog: MemoryCatalog) -> Self {
        let backends = MemoryBackends::new(catalog);
        let service = PullService::new(banners(), config, backends.backends())
            .expect("valid service configuration");
        Self {
            service: Arc::new(service),
            backends,
        }
    }

    pub fn fund(&self, who: &str, kind: CurrencyKind, amount: u64) {
        self.backends
            .ledger
            .deposit(&player(who), CurrencyAmount::new(kind, amount));
    }

    pub fn balance(&self, who: &str, kind: CurrencyKind) -> u64 {
        self.backends.ledger.spendable(&player(who), kind)
    }

    pub fn request(&self, who: &str, banner: &str, draws: u32, seed: u64) -> PullRequest {
        PullRequest::new(player(who), server(), BannerId::new(banner), draws).with_seed(seed)
    }
}
