//! Turns a resolved rarity into a concrete item, converting duplicates to fragments.
use crate::constants::{FRAGMENTS_COMMON, FRAGMENTS_EPIC, FRAGMENTS_LEGENDARY, FRAGMENTS_RARE};
use crate::ids::ItemId;
use crate::rarity::Rarity;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fragments granted per rarity when the drawn hero is already owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentTable {
    #[serde(default = "FragmentTable::default_common")]
    pub common: u32,
    #[serde(default = "FragmentTable::default_rare")]
    pub rare: u32,
    #[serde(default = "FragmentTable::default_epic")]
    pub epic: u32,
    #[serde(default = "FragmentTable::default_legendary")]
    pub legendary: u32,
}

impl Default for FragmentTable {
    fn default() -> Self {
        Self {
            common: FRAGMENTS_COMMON,
            rare: FRAGMENTS_RARE,
            epic: FRAGMENTS_EPIC,
            legendary: FRAGMENTS_LEGENDARY,
        }
    }
}

impl FragmentTable {
    const fn default_common() -> u32 {
        FRAGMENTS_COMMON
    }

    const fn default_rare() -> u32 {
        FRAGMENTS_RARE
    }

    const fn default_epic() -> u32 {
        FRAGMENTS_EPIC
    }

    const fn default_legendary() -> u32 {
        FRAGMENTS_LEGENDARY
    }

    #[must_use]
    pub const fn amount(&self, rarity: Rarity) -> u32 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }
}

/// Ownership as seen by one session: stored answers plus grants made so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipSnapshot {
    known: HashMap<ItemId, bool>,
}

impl OwnershipSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what the ownership store answered for an item.
    pub fn record(&mut self, item: ItemId, owned: bool) {
        self.known.insert(item, owned);
    }

    #[must_use]
    pub fn is_known(&self, item: &ItemId) -> bool {
        self.known.contains_key(item)
    }

    #[must_use]
    pub fn owns(&self, item: &ItemId) -> bool {
        self.known.get(item).copied().unwrap_or(false)
    }

    pub fn mark_owned(&mut self, item: &ItemId) {
        self.known.insert(item.clone(), true);
    }
}

/// Concrete reward of one draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Materialized {
    pub item_id: ItemId,
    pub is_new: bool,
    pub fragments_granted: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemMaterializer {
    fragments: FragmentTable,
}

impl ItemMaterializer {
    #[must_use]
    pub const fn new(fragments: FragmentTable) -> Self {
        Self { fragments }
    }

    #[must_use]
    pub const fn fragments(&self) -> &FragmentTable {
        &self.fragments
    }

    /// Pick the item a draw lands on: the forced item, or a uniform sample of the pool.
    pub fn pick<R: Rng>(
        &self,
        forced: Option<&ItemId>,
        pool: &[ItemId],
        rng: &mut R,
    ) -> Option<ItemId> {
        forced.or_else(|| pool.choose(rng)).cloned()
    }

    /// Settle a picked item against the snapshot, marking it owned afterwards.
    pub fn settle(
        &self,
        item_id: ItemId,
        rarity: Rarity,
        ownership: &mut OwnershipSnapshot,
    ) -> Materialized {
        if ownership.owns(&item_id) {
            return Materialized {
                item_id,
                is_new: false,
                fragments_granted: self.fragments.amount(rarity),
            };
        }
        ownership.mark_owned(&item_id);
        Materialized {
            item_id,
            is_new: true,
            fragments_granted: 0,
        }
    }

    /// Pick and settle in one step. Returns `None` only for an empty pool
    /// with no forced item.
    pub fn materialize<R: Rng>(
        &self,
        rarity: Rarity,
        forced: Option<&ItemId>,
        pool: &[ItemId],
        ownership: &mut OwnershipSnapshot,
        rng: &mut R,
    ) -> Option<Materialized> {
        let item = self.pick(forced, pool, rng)?;
        Some(self.settle(item, rarity, ownership))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn ids(names: &[&str]) -> Vec<ItemId> {
        names.iter().map(|name| ItemId::new(name)).collect()
    }

    #[test]
    fn owned_item_converts_to_fragments() {
        let materializer = ItemMaterializer::default();
        let mut snapshot = OwnershipSnapshot::new();
        snapshot.record(ItemId::new("knight"), true);
        let mut rng = ChaCha20Rng::from_seed([0u8; 32]);
        let result = materializer
            .materialize(
                Rarity::Epic,
                None,
                &ids(&["knight"]),
                &mut snapshot,
                &mut rng,
            )
            .unwrap();
        assert!(!result.is_new);
        assert_eq!(result.fragments_granted, FRAGMENTS_EPIC);
    }

    #[test]
    fn new_item_is_granted_and_second_copy_is_duplicate() {
        let materializer = ItemMaterializer::default();
        let mut snapshot = OwnershipSnapshot::new();
        let mut rng = ChaCha20Rng::from_seed([0u8; 32]);
        let pool = ids(&["ember"]);
        let first = materializer
            .materialize(Rarity::Legendary, None, &pool, &mut snapshot, &mut rng)
            .unwrap();
        assert!(first.is_new);
        assert_eq!(first.fragments_granted, 0);
        let second = materializer
            .materialize(Rarity::Legendary, None, &pool, &mut snapshot, &mut rng)
            .unwrap();
        assert!(!second.is_new);
        assert_eq!(second.fragments_granted, FRAGMENTS_LEGENDARY);
    }

    #[test]
    fn forced_item_bypasses_pool() {
        let materializer = ItemMaterializer::default();
        let mut rng = ChaCha20Rng::from_seed([9u8; 32]);
        let forced = ItemId::new("aurora");
        let picked = materializer.pick(Some(&forced), &ids(&["ember", "blaze"]), &mut rng);
        assert_eq!(picked, Some(forced));
        assert_eq!(materializer.pick(None, &[], &mut rng), None);
    }

    #[test]
    fn custom_fragment_table_is_used() {
        let table = FragmentTable {
            common: 2,
            ..FragmentTable::default()
        };
        let materializer = ItemMaterializer::new(table);
        let mut snapshot = OwnershipSnapshot::new();
        snapshot.record(ItemId::new("slime"), true);
        let settled = materializer.settle(ItemId::new("slime"), Rarity::Common, &mut snapshot);
        assert_eq!(settled.fragments_granted, 2);
    }
}
