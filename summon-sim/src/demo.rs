//! Built-in banners and item catalog used when no `--banners` file is given.
use summon_core::{BannerCatalog, BannerType, Element, MemoryCatalog, Rarity};

pub const DEMO_BANNERS_JSON: &str = r#"{
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
            "id": "starfall",
            "name": "Starfall Limited",
            "type": "limited",
            "rates": { "common": 45, "rare": 33, "epic": 18, "legendary": 4 },
            "pity": { "legendary": 80, "epic": 10 },
            "cost": { "kind": "gems", "single": 300, "bundle": 2700 }
        },
        {
            "id": "friendship",
            "name": "Friendship Summon",
            "type": "ticket",
            "rates": { "common": 70, "rare": 25, "epic": 5 },
            "pity": { "legendary": 200, "epic": 20 },
            "cost": { "kind": "friendship_points", "single": 10 }
        },
        {
            "id": "inferno",
            "name": "Inferno Gate",
            "type": "elemental",
            "element": "fire",
            "rates": { "common": 50, "rare": 30, "epic": 15, "legendary": 5 },
            "cost": { "kind": "elemental_scroll", "single": 1 }
        }
    ]
}"#;

/// # Errors
///
/// Returns an error only if the embedded catalog is malformed.
pub fn demo_banners() -> anyhow::Result<BannerCatalog> {
    Ok(BannerCatalog::from_json(DEMO_BANNERS_JSON)?)
}

/// Demo heroes, with element restrictions taken from `banners`.
#[must_use]
pub fn demo_catalog(banners: &BannerCatalog) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new()
        .with_items(Rarity::Common, &["slime", "goblin", "bat", "rat", "imp"])
        .with_items(Rarity::Rare, &["archer", "monk", "rogue", "squire"])
        .with_items(Rarity::Epic, &["knight", "mage", "priest"])
        .with_items(Rarity::Legendary, &["aurora", "blaze", "cinder", "dusk", "ember"]);
    for (element, [common, rare, epic, legendary]) in [
        (Element::Fire, ["cinderling", "flamecaller", "pyromancer", "phoenix"]),
        (Element::Water, ["tidepup", "wavecaller", "leviathan", "abyssal"]),
        (Element::Earth, ["pebble", "stonewarden", "golem", "titan"]),
        (Element::Light, ["glimmer", "lightbearer", "seraph", "radiant"]),
        (Element::Dark, ["shade", "nightblade", "revenant", "eclipse"]),
    ] {
        catalog = catalog
            .with_hero(common, Rarity::Common, element)
            .with_hero(rare, Rarity::Rare, element)
            .with_hero(epic, Rarity::Epic, element)
            .with_hero(legendary, Rarity::Legendary, element);
    }
    for banner in &banners.banners {
        if banner.kind == BannerType::Elemental
            && let Some(element) = banner.element
        {
            catalog = catalog.with_banner_element(&banner.id, element);
        }
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use summon_core::{BannerId, CatalogLookup};

    #[test]
    fn demo_banners_validate() {
        let banners = demo_banners().expect("demo banners");
        assert_eq!(banners.banners.len(), 4);
        assert!(banners.get(&BannerId::new("inferno")).is_some());
    }

    #[tokio::test]
    async fn elemental_banner_only_sees_its_element() {
        let banners = demo_banners().expect("demo banners");
        let catalog = demo_catalog(&banners);
        let pool = catalog
            .pool_by_rarity(&BannerId::new("inferno"), Rarity::Legendary)
            .await
            .expect("pool");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].as_str(), "phoenix");
        let standard = catalog
            .pool_by_rarity(&BannerId::new("standard"), Rarity::Legendary)
            .await
            .expect("pool");
        assert_eq!(standard.len(), 10);
    }
}
