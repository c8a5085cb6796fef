mod support;

use std::time::Duration;
use summon_core::{
    BannerId, CommitStep, CurrencyKind, ItemId, PityKey, PityState, PullError, RefundStatus,
    StoreError, WishlistKey, WishlistLimits, WishlistState,
};
use support::{Harness, STANDARD, TRAINING, player, quiet_config, server};

fn pity_key() -> PityKey {
    PityKey::new(player("p1"), BannerId::new(STANDARD), None)
}

fn wishlist_key() -> WishlistKey {
    WishlistKey::new(player("p1"), server(), None)
}

/// Seed a known pity and wishlist state so restores can be checked exactly.
fn seeded(config: summon_core::EngineConfig) -> (Harness, PityState, WishlistState) {
    let harness = Harness::new(config);
    harness.fund("p1", CurrencyKind::Gems, 3000);
    let pity = PityState {
        pulls_since_legendary: 30,
        pulls_since_epic: 2,
        total_pulls: 30,
        ..PityState::default()
    };
    let mut wishlist = WishlistState::new(WishlistLimits::default());
    wishlist.push(ItemId::new("aurora")).unwrap();
    wishlist.pity_counter = 40;
    harness.backends.pity.put(pity_key(), pity.clone());
    harness.backends.wishlists.put(wishlist_key(), wishlist.clone());
    (harness, pity, wishlist)
}

fn assert_untouched(harness: &Harness, pity: &PityState, wishlist: &WishlistState) {
    let p1 = player("p1");
    assert_eq!(harness.balance("p1", CurrencyKind::Gems), 3000);
    assert_eq!(harness.backends.ledger.open_holds(), 0);
    assert_eq!(harness.backends.pity.get(&pity_key()).as_ref(), Some(pity));
    assert_eq!(
        harness.backends.wishlists.get(&wishlist_key()).as_ref(),
        Some(wishlist)
    );
    assert_eq!(harness.backends.ownership.owned_count(&p1), 0);
    assert_eq!(harness.backends.ownership.total_fragments(&p1), 0);
    assert!(harness.backends.history.is_empty());
}

#[tokio::test]
async fn ledger_commit_failure_rolls_everything_back() {
    let (harness, pity, wishlist) = seeded(quiet_config());
    harness.backends.ledger.commit_faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 10, 21))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::CommitLedger,
            refund: RefundStatus::Refunded,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn pity_save_failure_refunds_without_partial_state() {
    let (harness, pity, wishlist) = seeded(quiet_config());
    harness.backends.pity.save_faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 22))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::SavePity,
            refund: RefundStatus::Refunded,
            ..
        }
    ));
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn mid_grant_failure_revokes_earlier_grants() {
    let (harness, pity, wishlist) = seeded(quiet_config());
    harness.backends.ownership.write_faults.fail_after(3);

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 10, 23))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::GrantItem | CommitStep::GrantFragments,
            refund: RefundStatus::Refunded,
            ..
        }
    ));
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn fragment_grants_are_reverted_on_failure() {
    let harness = Harness::new(quiet_config());
    harness.fund("p1", CurrencyKind::SummonScroll, 10);
    harness.backends.ledger.commit_faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", TRAINING, 10, 24))
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::Persistence { .. }));
    let p1 = player("p1");
    assert_eq!(harness.backends.ownership.owned_count(&p1), 0);
    assert_eq!(harness.backends.ownership.total_fragments(&p1), 0);
    assert_eq!(harness.balance("p1", CurrencyKind::SummonScroll), 10);
}

#[tokio::test]
async fn bonus_credits_are_debited_on_failure() {
    let mut config = quiet_config();
    config.bonus.chance = 1.0;
    let (harness, pity, wishlist) = seeded(config);
    harness.backends.ledger.commit_faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 10, 25))
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::Persistence { .. }));
    for kind in [CurrencyKind::Dust, CurrencyKind::Gold, CurrencyKind::SummonScroll] {
        assert_eq!(harness.balance("p1", kind), 0, "{kind} left credited");
    }
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn slow_commit_times_out_and_fails_closed() {
    let mut config = quiet_config();
    config.commit_timeout_ms = 50;
    let (harness, pity, wishlist) = seeded(config);
    harness
        .backends
        .ownership
        .write_faults
        .delay(Duration::from_millis(500));

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 26))
        .await
        .unwrap_err();

    match err {
        PullError::Persistence {
            step,
            source,
            refund,
        } => {
            assert!(matches!(
                step,
                CommitStep::GrantItem | CommitStep::GrantFragments
            ));
            assert_eq!(source, StoreError::Timeout { timeout_ms: 50 });
            assert_eq!(refund, RefundStatus::Refunded);
        }
        other => panic!("expected persistence failure, got {other:?}"),
    }
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn fragments_that_land_after_a_timeout_are_revoked() {
    let mut config = quiet_config();
    config.commit_timeout_ms = 50;
    let harness = Harness::new(config);
    let p1 = player("p1");
    let slime = ItemId::new("slime");
    harness.fund("p1", CurrencyKind::SummonScroll, 1);
    harness.backends.ownership.insert(&p1, &slime);
    harness
        .backends
        .ownership
        .write_faults
        .delay_ack(Duration::from_millis(500));

    let err = harness
        .service
        .pull(harness.request("p1", TRAINING, 1, 30))
        .await
        .unwrap_err();

    match err {
        PullError::Persistence {
            step,
            source,
            refund,
        } => {
            assert_eq!(step, CommitStep::GrantFragments);
            assert_eq!(source, StoreError::Timeout { timeout_ms: 50 });
            assert_eq!(refund, RefundStatus::Refunded);
        }
        other => panic!("expected persistence failure, got {other:?}"),
    }
    assert!(harness.backends.ownership.owns(&p1, &slime));
    assert_eq!(harness.backends.ownership.fragments(&p1, &slime), 0);
    assert_eq!(harness.balance("p1", CurrencyKind::SummonScroll), 1);
    assert_eq!(harness.backends.ledger.open_holds(), 0);
}

#[tokio::test]
async fn bonus_credit_that_lands_after_a_timeout_is_debited() {
    let mut config = quiet_config();
    config.commit_timeout_ms = 50;
    config.bonus.chance = 1.0;
    let (harness, pity, wishlist) = seeded(config);
    harness
        .backends
        .ledger
        .credit_faults
        .delay_ack(Duration::from_millis(500));

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 31))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::CreditBonus,
            source: StoreError::Timeout { timeout_ms: 50 },
            refund: RefundStatus::Refunded,
        }
    ));
    for kind in [CurrencyKind::Dust, CurrencyKind::Gold, CurrencyKind::SummonScroll] {
        assert_eq!(harness.balance("p1", kind), 0, "{kind} left credited");
    }
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn failed_refund_is_reported_and_hold_stays_open() {
    let (harness, _, _) = seeded(quiet_config());
    harness.backends.ledger.commit_faults.fail_next();
    harness.backends.ledger.release_faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 27))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::CommitLedger,
            refund: RefundStatus::RefundFailed,
            ..
        }
    ));
    assert_eq!(harness.backends.ledger.open_holds(), 1);
    assert_eq!(harness.balance("p1", CurrencyKind::Gems), 2700);
}

#[tokio::test]
async fn ownership_lookup_failure_happens_before_any_write() {
    let (harness, pity, wishlist) = seeded(quiet_config());
    harness.backends.ownership.read_faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 10, 28))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::OwnershipLookup,
            refund: RefundStatus::Refunded,
            ..
        }
    ));
    assert_untouched(&harness, &pity, &wishlist);
}

#[tokio::test]
async fn catalog_outage_fails_in_preflight() {
    let (harness, pity, wishlist) = seeded(quiet_config());
    harness.backends.catalog.faults.fail_next();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 29))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PullError::Persistence {
            step: CommitStep::Preflight,
            refund: RefundStatus::NotNeeded,
            ..
        }
    ));
    assert_untouched(&harness, &pity, &wishlist);
}
