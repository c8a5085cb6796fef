//! Audit records of completed sessions and analytics derived from them.
use crate::backend::HistorySink;
use crate::constants::LOG_TARGET_HISTORY;
use crate::currency::{CurrencyAmount, CurrencyKind};
use crate::error::StoreError;
use crate::ids::{BannerId, ItemId, PlayerId, ServerId, SessionId};
use crate::numbers::ratio;
use crate::rarity::Rarity;
use crate::resolver::ResolutionTrigger;
use crate::rng::RngUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;
use twox_hash::XxHash64;

/// Bonus payouts of a single draw; almost always zero or one.
pub type BonusDrops = SmallVec<[CurrencyAmount; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullType {
    Single,
    Multi,
}

impl PullType {
    #[must_use]
    pub const fn from_draws(draws: u32) -> Self {
        if draws > 1 { Self::Multi } else { Self::Single }
    }
}

impl fmt::Display for PullType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Multi => "multi",
        })
    }
}

/// One draw inside a record, in draw order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullEntry {
    pub item_id: ItemId,
    pub rarity: Rarity,
    pub is_new: bool,
    pub fragments_granted: u32,
    pub is_wishlist_hit: bool,
    pub trigger: ResolutionTrigger,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub bonus: BonusDrops,
}

/// Write-once audit record of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRecord {
    pub session_id: SessionId,
    pub player: PlayerId,
    pub server: ServerId,
    pub banner: BannerId,
    pub pull_type: PullType,
    pub entries: Vec<PullEntry>,
    pub cost: CurrencyAmount,
    /// Seed of the session's RNG bundle; replaying it reproduces the draws.
    pub seed: u64,
    #[serde(default)]
    pub rng_usage: RngUsage,
    pub created_at: DateTime<Utc>,
    /// xxHash64 of the canonical JSON form with this field zeroed.
    #[serde(default)]
    pub digest: u64,
}

impl PullRecord {
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn content_digest(&self) -> Result<u64, serde_json::Error> {
        let canonical = Self {
            digest: 0,
            ..self.clone()
        };
        let bytes = serde_json::to_vec(&canonical)?;
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&bytes);
        Ok(hasher.finish())
    }

    /// Stamp the digest. Called once, right before the record is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn seal(mut self) -> Result<Self, serde_json::Error> {
        self.digest = self.content_digest()?;
        Ok(self)
    }

    /// Whether the stored digest still matches the content.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.content_digest()
            .is_ok_and(|digest| digest == self.digest)
    }

    /// Bonus payouts of the whole session, summed per currency.
    #[must_use]
    pub fn bonus_totals(&self) -> BTreeMap<CurrencyKind, u64> {
        let mut totals = BTreeMap::new();
        for drop in self.entries.iter().flat_map(|entry| entry.bonus.iter()) {
            let total: &mut u64 = totals.entry(drop.kind).or_default();
            *total = total.saturating_add(drop.amount);
        }
        totals
    }
}

/// Appends records to the configured sink.
#[derive(Clone)]
pub struct HistoryRecorder {
    sink: Arc<dyn HistorySink>,
}

impl fmt::Debug for HistoryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryRecorder").finish_non_exhaustive()
    }
}

impl HistoryRecorder {
    #[must_use]
    pub fn new(sink: Arc<dyn HistorySink>) -> Self {
        Self { sink }
    }

    /// Append a sealed record. A failure is logged together with the
    /// serialized record so it can be replayed into the sink by hand.
    ///
    /// # Errors
    ///
    /// Returns the sink's error.
    pub async fn record(&self, record: &PullRecord) -> Result<(), StoreError> {
        match self.sink.append(record).await {
            Ok(()) => {
                log::debug!(
                    target: LOG_TARGET_HISTORY,
                    "{} appended ({} entries, digest {:016x})",
                    record.session_id,
                    record.entries.len(),
                    record.digest
                );
                Ok(())
            }
            Err(err) => {
                let payload = serde_json::to_string(record)
                    .unwrap_or_else(|ser| format!("<unserializable: {ser}>"));
                log::error!(
                    target: LOG_TARGET_HISTORY,
                    "history append failed for {}: {err}; record: {payload}",
                    record.session_id
                );
                Err(err)
            }
        }
    }
}

/// Aggregates over a set of records, in record order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub sessions: usize,
    pub draws: usize,
    pub rarity_counts: BTreeMap<Rarity, usize>,
    pub wishlist_hits: usize,
    pub new_items: usize,
    pub fragments: u64,
    pub bonus_drops: usize,
    pub bonus_totals: BTreeMap<CurrencyKind, u64>,
    /// Most consecutive non-Legendary draws on any (player, banner) pair.
    pub longest_legendary_drought: u32,
    /// Most consecutive non-Epic-or-better draws on any (player, banner) pair.
    pub longest_epic_drought: u32,
    pub tampered: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn from_records(records: &[PullRecord]) -> Self {
        let mut stats = Self::default();
        let mut streaks: HashMap<(&PlayerId, &BannerId), (u32, u32)> = HashMap::new();
        for record in records {
            stats.sessions += 1;
            if !record.verify() {
                stats.tampered += 1;
            }
            let streak = streaks
                .entry((&record.player, &record.banner))
                .or_default();
            for entry in &record.entries {
                stats.draws += 1;
                *stats.rarity_counts.entry(entry.rarity).or_default() += 1;
                stats.wishlist_hits += usize::from(entry.is_wishlist_hit);
                stats.new_items += usize::from(entry.is_new);
                stats.fragments = stats
                    .fragments
                    .saturating_add(u64::from(entry.fragments_granted));
                stats.bonus_drops += entry.bonus.len();
                for drop in &entry.bonus {
                    let total = stats.bonus_totals.entry(drop.kind).or_default();
                    *total = total.saturating_add(drop.amount);
                }
                if entry.rarity == Rarity::Legendary {
                    streak.0 = 0;
                } else {
                    streak.0 = streak.0.saturating_add(1);
                }
                if entry.rarity >= Rarity::Epic {
                    streak.1 = 0;
                } else {
                    streak.1 = streak.1.saturating_add(1);
                }
                stats.longest_legendary_drought = stats.longest_legendary_drought.max(streak.0);
                stats.longest_epic_drought = stats.longest_epic_drought.max(streak.1);
            }
        }
        stats
    }

    #[must_use]
    pub fn count(&self, rarity: Rarity) -> usize {
        self.rarity_counts.get(&rarity).copied().unwrap_or(0)
    }

    /// Observed share of draws landing on `rarity`.
    #[must_use]
    pub fn frequency(&self, rarity: Rarity) -> f64 {
        ratio(self.count(rarity), self.draws)
    }
}
