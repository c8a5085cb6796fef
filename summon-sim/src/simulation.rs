//! Drives many pull sessions against in-memory backends and checks the results.
use anyhow::{Context, Result, anyhow, ensure};
use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use summon_core::{
    Banner, BannerCatalog, BannerId, CurrencyAmount, EngineConfig, HistoryStats, ItemId,
    MemoryBackends, MemoryCatalog, PityThresholds, PlayerId, PullError, PullRecord, PullRequest,
    PullService, Rarity, RefundStatus, ServerId,
};
use tokio::task::JoinSet;

const LOG_TARGET: &str = "summon_sim";

/// What to run: one banner, a number of sessions spread over players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationPlan {
    pub banner: BannerId,
    pub server: ServerId,
    pub sessions: u32,
    pub draws: u32,
    pub players: u32,
    pub seed: u64,
    #[serde(default)]
    pub wishlist: Vec<ItemId>,
    /// Share of ownership and pity writes that fail, in `[0, 1]`.
    #[serde(default)]
    pub fault_rate: f64,
    #[serde(default)]
    pub promotional: bool,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(banner: BannerId, sessions: u32, draws: u32, players: u32, seed: u64) -> Self {
        Self {
            banner,
            server: ServerId::new("sim"),
            sessions,
            draws,
            players,
            seed,
            wishlist: Vec::new(),
            fault_rate: 0.0,
            promotional: false,
        }
    }

    /// Sessions assigned to the player at `index`; the remainder goes to the first players.
    #[must_use]
    pub fn sessions_for(&self, index: u32) -> u32 {
        if self.players == 0 {
            return 0;
        }
        let base = self.sessions / self.players;
        base + u32::from(index < self.sessions % self.players)
    }

    /// Every how many writes a fault is injected, if at all.
    #[must_use]
    pub fn fault_interval(&self) -> Option<u32> {
        if self.fault_rate <= 0.0 {
            return None;
        }
        num_traits::cast::<f64, u32>((1.0 / self.fault_rate).round()).map(|n| n.max(1))
    }
}

/// Session outcomes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTally {
    pub succeeded: u32,
    /// Persistence failures whose reservation was released.
    pub refunded: u32,
    /// Failures before any currency was reserved.
    pub failed: u32,
    pub refund_failed: u32,
    pub conflicts: u32,
    pub insufficient: u32,
    /// Committed sessions the history sink rejected.
    pub unrecorded: u32,
}

impl SessionTally {
    fn record_failure(&mut self, err: &PullError) {
        match err {
            PullError::Persistence {
                refund: RefundStatus::Refunded,
                ..
            } => self.refunded += 1,
            PullError::Persistence {
                refund: RefundStatus::RefundFailed,
                ..
            } => self.refund_failed += 1,
            PullError::ConcurrencyConflict { .. } => self.conflicts += 1,
            PullError::InsufficientCurrency { .. } => self.insufficient += 1,
            PullError::Persistence { .. }
            | PullError::Configuration(_)
            | PullError::Transition(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.refunded += other.refunded;
        self.failed += other.failed;
        self.refund_failed += other.refund_failed;
        self.conflicts += other.conflicts;
        self.insufficient += other.insufficient;
        self.unrecorded += other.unrecorded;
    }

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.succeeded
            + self.refunded
            + self.failed
            + self.refund_failed
            + self.conflicts
            + self.insufficient
    }
}

/// Observed frequency of one rarity next to its configured weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarityRow {
    pub rarity: Rarity,
    pub count: usize,
    pub observed: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMismatch {
    pub player: PlayerId,
    pub expected: u64,
    pub actual: u64,
}

/// Final balances reconciled against funding, spend and bonus credits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCheck {
    pub players_checked: usize,
    pub open_holds: usize,
    pub mismatches: Vec<LedgerMismatch>,
}

impl LedgerCheck {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.open_holds == 0 && self.mismatches.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub generated_at: DateTime<Utc>,
    pub banner_name: String,
    pub plan: SimulationPlan,
    pub pity: PityThresholds,
    pub elapsed_ms: u64,
    pub sessions: SessionTally,
    pub stats: HistoryStats,
    pub rarities: Vec<RarityRow>,
    pub ledger: LedgerCheck,
    pub violations: Vec<String>,
}

impl SimulationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug)]
struct Participant {
    player: PlayerId,
    sessions: u32,
    seed: u64,
    funded: CurrencyAmount,
}

/// Run `plan` and reconcile the in-memory backends afterwards.
///
/// # Errors
///
/// Fails when the banner is unknown, the draw count is out of range, the
/// service rejects its configuration or a wishlist entry cannot be added.
/// Failed sessions are counted in the report, not returned.
pub async fn run_simulation(
    banners: BannerCatalog,
    catalog: MemoryCatalog,
    config: EngineConfig,
    plan: SimulationPlan,
) -> Result<SimulationReport> {
    ensure!(plan.players > 0, "at least one player is required");
    ensure!(
        (0.0..=1.0).contains(&plan.fault_rate),
        "fault rate {} is outside [0, 1]",
        plan.fault_rate
    );
    let banner = banners.require(&plan.banner)?.clone();
    config.check_draws(plan.draws)?;

    let backends = MemoryBackends::new(catalog);
    let service = Arc::new(
        PullService::new(banners, config, backends.backends())
            .context("invalid engine configuration")?,
    );

    let participants = enroll(&plan, &banner, &backends);
    seed_wishlists(&service, &plan, &banner, &participants).await?;
    if let Some(every) = plan.fault_interval() {
        log::info!(target: LOG_TARGET, "injecting a write fault every {every} calls");
        backends.ownership.write_faults.fail_every(every);
        backends.pity.save_faults.fail_every(every);
    }

    let started = Instant::now();
    let sessions = drive(&service, &plan, &participants).await?;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    backends.ownership.write_faults.clear();
    backends.pity.save_faults.clear();

    let records = backends.history.records();
    let stats = HistoryStats::from_records(&records);
    let ledger = reconcile(&backends, &participants, &records);
    let rarities = Rarity::ALL
        .into_iter()
        .map(|rarity| RarityRow {
            rarity,
            count: stats.count(rarity),
            observed: stats.frequency(rarity),
            expected: banner.rates.probability(rarity),
        })
        .collect();

    let mut report = SimulationReport {
        generated_at: Utc::now(),
        banner_name: banner.name.clone(),
        plan,
        pity: banner.pity,
        elapsed_ms,
        sessions,
        stats,
        rarities,
        ledger,
        violations: Vec::new(),
    };
    report.violations = find_violations(&report, records.len());
    Ok(report)
}

fn enroll(plan: &SimulationPlan, banner: &Banner, backends: &MemoryBackends) -> Vec<Participant> {
    let mut seeds = ChaCha20Rng::seed_from_u64(plan.seed);
    (0..plan.players)
        .map(|index| {
            let player = PlayerId::new(&format!("player-{index:03}"));
            let sessions = plan.sessions_for(index);
            let per_session = banner.cost_for(plan.draws);
            let funded = CurrencyAmount::new(
                per_session.kind,
                per_session.amount.saturating_mul(u64::from(sessions)),
            );
            backends.ledger.deposit(&player, funded);
            Participant {
                player,
                sessions,
                seed: seeds.next_u64(),
                funded,
            }
        })
        .collect()
}

async fn seed_wishlists(
    service: &PullService,
    plan: &SimulationPlan,
    banner: &Banner,
    participants: &[Participant],
) -> Result<()> {
    if plan.wishlist.is_empty() {
        return Ok(());
    }
    for participant in participants {
        let key = PullService::wishlist_key(banner, &participant.player, &plan.server)
            .ok_or_else(|| anyhow!("banner {} does not take part in wishlists", banner.id))?;
        for item in &plan.wishlist {
            service
                .wishlists()
                .add_hero(&key, item.clone())
                .await
                .with_context(|| format!("cannot wishlist {item} for {}", participant.player))?;
        }
    }
    Ok(())
}

/// One task per player; a player's sessions run back to back.
async fn drive(
    service: &Arc<PullService>,
    plan: &SimulationPlan,
    participants: &[Participant],
) -> Result<SessionTally> {
    let mut tasks = JoinSet::new();
    for participant in participants {
        let service = Arc::clone(service);
        let player = participant.player.clone();
        let server = plan.server.clone();
        let banner = plan.banner.clone();
        let (sessions, seed, draws, promotional) = (
            participant.sessions,
            participant.seed,
            plan.draws,
            plan.promotional,
        );
        tasks.spawn(async move {
            let mut tally = SessionTally::default();
            for index in 0..sessions {
                let request =
                    PullRequest::new(player.clone(), server.clone(), banner.clone(), draws)
                        .with_seed(seed.wrapping_add(u64::from(index)))
                        .promotional(promotional);
                match service.pull(request).await {
                    Ok(outcome) => {
                        tally.succeeded += 1;
                        tally.unrecorded += u32::from(!outcome.history_recorded);
                        log::debug!(
                            target: LOG_TARGET,
                            "{} {}: {} draws, {} wishlist hits",
                            player,
                            outcome.session_id(),
                            outcome.entries().len(),
                            outcome.wishlist_hits()
                        );
                    }
                    Err(err) => tally.record_failure(&err),
                }
            }
            tally
        });
    }

    let mut total = SessionTally::default();
    while let Some(joined) = tasks.join_next().await {
        total.merge(joined.context("session task panicked")?);
    }
    Ok(total)
}

fn reconcile(
    backends: &MemoryBackends,
    participants: &[Participant],
    records: &[PullRecord],
) -> LedgerCheck {
    let mut spent: BTreeMap<&PlayerId, u64> = BTreeMap::new();
    let mut credited: BTreeMap<&PlayerId, u64> = BTreeMap::new();
    for participant in participants {
        let kind = participant.funded.kind;
        for record in records.iter().filter(|r| r.player == participant.player) {
            let paid = spent.entry(&participant.player).or_default();
            *paid = paid.saturating_add(record.cost.amount);
            let bonus = record.bonus_totals().get(&kind).copied().unwrap_or(0);
            let gained = credited.entry(&participant.player).or_default();
            *gained = gained.saturating_add(bonus);
        }
    }

    let mismatches = participants
        .iter()
        .filter_map(|participant| {
            let expected = participant
                .funded
                .amount
                .saturating_sub(spent.get(&participant.player).copied().unwrap_or(0))
                .saturating_add(credited.get(&participant.player).copied().unwrap_or(0));
            let actual = backends
                .ledger
                .spendable(&participant.player, participant.funded.kind);
            (expected != actual).then(|| LedgerMismatch {
                player: participant.player.clone(),
                expected,
                actual,
            })
        })
        .collect();

    LedgerCheck {
        players_checked: participants.len(),
        open_holds: backends.ledger.open_holds(),
        mismatches,
    }
}

fn find_violations(report: &SimulationReport, recorded: usize) -> Vec<String> {
    let mut violations = Vec::new();
    let stats = &report.stats;
    if stats.longest_legendary_drought >= report.pity.legendary {
        violations.push(format!(
            "legendary drought of {} draws reaches pity threshold {}",
            stats.longest_legendary_drought, report.pity.legendary
        ));
    }
    if stats.longest_epic_drought >= report.pity.epic {
        violations.push(format!(
            "epic drought of {} draws reaches pity threshold {}",
            stats.longest_epic_drought, report.pity.epic
        ));
    }
    if stats.tampered > 0 {
        violations.push(format!("{} history records fail digest check", stats.tampered));
    }
    let expected_records = report.sessions.succeeded - report.sessions.unrecorded;
    if usize::try_from(expected_records).ok() != Some(recorded) {
        violations.push(format!(
            "{recorded} history records for {expected_records} recorded sessions"
        ));
    }
    if report.sessions.insufficient > 0 {
        violations.push(format!(
            "{} sessions ran out of currency despite exact funding",
            report.sessions.insufficient
        ));
    }
    if report.sessions.refund_failed > 0 {
        violations.push(format!(
            "{} sessions could not release their reservation",
            report.sessions.refund_failed
        ));
    }
    if report.ledger.open_holds > 0 {
        violations.push(format!(
            "{} currency holds left open",
            report.ledger.open_holds
        ));
    }
    for mismatch in &report.ledger.mismatches {
        violations.push(format!(
            "{} balance {} differs from expected {}",
            mismatch.player, mismatch.actual, mismatch.expected
        ));
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{demo_banners, demo_catalog};

    async fn simulate(plan: SimulationPlan) -> SimulationReport {
        let banners = demo_banners().expect("demo banners");
        let catalog = demo_catalog(&banners);
        run_simulation(banners, catalog, EngineConfig::default(), plan)
            .await
            .expect("simulation runs")
    }

    #[test]
    fn sessions_are_spread_over_players() {
        let plan = SimulationPlan::new(BannerId::new("standard"), 10, 10, 4, 1);
        let shares: Vec<u32> = (0..4).map(|index| plan.sessions_for(index)).collect();
        assert_eq!(shares, vec![3, 3, 2, 2]);
    }

    #[test]
    fn fault_rate_maps_to_interval() {
        let mut plan = SimulationPlan::new(BannerId::new("standard"), 1, 1, 1, 1);
        assert_eq!(plan.fault_interval(), None);
        plan.fault_rate = 0.1;
        assert_eq!(plan.fault_interval(), Some(10));
        plan.fault_rate = 1.0;
        assert_eq!(plan.fault_interval(), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn clean_run_has_no_violations() {
        let report = simulate(SimulationPlan::new(
            BannerId::new("standard"),
            40,
            10,
            4,
            0x5EED,
        ))
        .await;
        assert!(report.passed(), "{:?}", report.violations);
        assert_eq!(report.sessions.succeeded, 40);
        assert_eq!(report.stats.draws, 400);
        assert!(report.ledger.is_consistent());
        assert!(report.stats.longest_legendary_drought < 90);
        assert!(report.stats.longest_epic_drought < 10);
    }

    #[tokio::test]
    async fn same_seed_gives_same_distribution() {
        let plan = SimulationPlan::new(BannerId::new("starfall"), 12, 10, 3, 99);
        let first = simulate(plan.clone()).await;
        let second = simulate(plan).await;
        assert_eq!(first.stats.rarity_counts, second.stats.rarity_counts);
        assert_eq!(
            first.stats.longest_legendary_drought,
            second.stats.longest_legendary_drought
        );
    }

    #[tokio::test]
    async fn injected_faults_refund_and_keep_ledger_consistent() {
        let mut plan = SimulationPlan::new(BannerId::new("standard"), 30, 10, 3, 7);
        plan.fault_rate = 0.05;
        let report = simulate(plan).await;
        assert!(report.sessions.refunded > 0);
        assert_eq!(report.sessions.total(), 30);
        assert!(report.ledger.is_consistent(), "{:?}", report.ledger);
        assert!(report.passed(), "{:?}", report.violations);
    }

    #[tokio::test]
    async fn wishlist_hits_are_counted() {
        let mut plan = SimulationPlan::new(BannerId::new("standard"), 20, 10, 1, 3);
        plan.wishlist = vec![ItemId::new("aurora")];
        let report = simulate(plan).await;
        assert!(report.stats.wishlist_hits >= 1);
        assert!(report.passed(), "{:?}", report.violations);
    }

    #[tokio::test]
    async fn unknown_banner_is_an_error() {
        let banners = demo_banners().expect("demo banners");
        let catalog = demo_catalog(&banners);
        let plan = SimulationPlan::new(BannerId::new("nope"), 1, 1, 1, 1);
        let err = run_simulation(banners, catalog, EngineConfig::default(), plan)
            .await
            .expect_err("unknown banner");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn violations_flag_open_holds_and_droughts() {
        let mut report = SimulationReport {
            generated_at: Utc::now(),
            banner_name: String::from("Standard Summon"),
            plan: SimulationPlan::new(BannerId::new("standard"), 1, 10, 1, 1),
            pity: PityThresholds::default(),
            elapsed_ms: 0,
            sessions: SessionTally {
                succeeded: 1,
                ..SessionTally::default()
            },
            stats: HistoryStats::default(),
            rarities: Vec::new(),
            ledger: LedgerCheck {
                players_checked: 1,
                open_holds: 1,
                mismatches: Vec::new(),
            },
            violations: Vec::new(),
        };
        report.stats.longest_legendary_drought = 90;
        let violations = find_violations(&report, 1);
        assert_eq!(violations.len(), 2, "{violations:?}");
        assert!(violations.iter().any(|v| v.contains("legendary drought")));
        assert!(violations.iter().any(|v| v.contains("holds left open")));
    }
}
