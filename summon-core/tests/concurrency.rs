mod support;

use std::sync::Arc;
use std::time::Duration;
use summon_core::{
    BannerId, CurrencyKind, EngineConfig, ItemId, PityKey, PullError, PullService, WishlistKey,
};
use support::{DRILL, Harness, STANDARD, TRAINING, player, quiet_config, server};

fn impatient() -> EngineConfig {
    EngineConfig {
        lock_timeout_ms: 20,
        ..quiet_config()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_player_sessions_serialize_without_lost_updates() {
    let harness = Harness::new(quiet_config());
    harness.fund("p1", CurrencyKind::Gems, 2700 * 8);

    let mut handles = Vec::new();
    for seed in 0..8 {
        let service: Arc<PullService> = Arc::clone(&harness.service);
        let request = harness.request("p1", STANDARD, 10, seed);
        handles.push(tokio::spawn(async move { service.pull(request).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let pity = harness
        .backends
        .pity
        .get(&PityKey::new(player("p1"), BannerId::new(STANDARD), None))
        .unwrap();
    assert_eq!(pity.total_pulls, 80);
    let wishlist = harness
        .backends
        .wishlists
        .get(&WishlistKey::new(player("p1"), server(), None))
        .unwrap();
    assert_eq!(wishlist.pity_counter, 80);
    assert_eq!(harness.balance("p1", CurrencyKind::Gems), 0);
    assert_eq!(harness.backends.history.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_players_run_in_parallel() {
    let harness = Harness::new(quiet_config());
    let players = ["p1", "p2", "p3", "p4"];
    for who in players {
        harness.fund(who, CurrencyKind::Gems, 2700);
    }

    let mut handles = Vec::new();
    for (seed, who) in (0u64..).zip(players) {
        let service = Arc::clone(&harness.service);
        let request = harness.request(who, STANDARD, 10, seed);
        handles.push(tokio::spawn(async move { service.pull(request).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for who in players {
        assert_eq!(harness.balance(who, CurrencyKind::Gems), 0);
    }
}

#[tokio::test]
async fn held_pity_key_yields_conflict_before_any_charge() {
    let harness = Harness::new(impatient());
    harness.fund("p1", CurrencyKind::Gems, 300);
    let key = PityKey::new(player("p1"), BannerId::new(STANDARD), None);
    let lease = harness.service.pity_store().lock(&key).await.unwrap();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::ConcurrencyConflict { .. }));
    assert!(err.is_retryable());
    assert_eq!(harness.balance("p1", CurrencyKind::Gems), 300);
    drop(lease);
    assert!(
        harness
            .service
            .pull(harness.request("p1", STANDARD, 1, 1))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn held_wishlist_key_yields_conflict_and_releases_pity() {
    let harness = Harness::new(impatient());
    harness.fund("p1", CurrencyKind::Gems, 300);
    let key = WishlistKey::new(player("p1"), server(), None);
    let lease = harness.service.wishlists().lock(&key).await.unwrap();

    let err = harness
        .service
        .pull(harness.request("p1", STANDARD, 1, 1))
        .await
        .unwrap_err();
    match err {
        PullError::ConcurrencyConflict { key } => assert!(key.starts_with("wishlist:")),
        other => panic!("expected conflict, got {other:?}"),
    }

    let pity_key = PityKey::new(player("p1"), BannerId::new(STANDARD), None);
    let pity = harness.service.pity_store().lock(&pity_key).await;
    assert!(pity.is_ok(), "pity key was released by the failed session");
    drop(pity);
    drop(lease);
    assert_eq!(harness.balance("p1", CurrencyKind::Gems), 300);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rollback_keeps_an_item_another_banner_paid_for() {
    let harness = Harness::new(quiet_config());
    harness.fund("p1", CurrencyKind::SummonScroll, 2);
    harness
        .backends
        .ownership
        .write_faults
        .delay(Duration::from_millis(50));
    harness.backends.ledger.commit_faults.fail_after(1);

    let (first, second) = tokio::join!(
        harness.service.pull(harness.request("p1", TRAINING, 1, 1)),
        harness.service.pull(harness.request("p1", DRILL, 1, 2)),
    );

    let succeeded: Vec<_> = [first, second].into_iter().filter_map(Result::ok).collect();
    assert_eq!(succeeded.len(), 1);
    let entry = &succeeded[0].entries()[0];
    assert_eq!(entry.item_id, ItemId::new("slime"));
    assert!(entry.is_new);
    let p1 = player("p1");
    assert!(harness.backends.ownership.owns(&p1, &ItemId::new("slime")));
    assert_eq!(harness.backends.ownership.total_fragments(&p1), 0);
    assert_eq!(harness.balance("p1", CurrencyKind::SummonScroll), 1);
    assert_eq!(harness.backends.ledger.open_holds(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_on_other_banners_wait_for_the_collection() {
    let harness = Harness::new(quiet_config());
    harness.fund("p1", CurrencyKind::SummonScroll, 20);
    harness.fund("p1", CurrencyKind::Gems, 2700);

    let mut handles = Vec::new();
    for (seed, banner) in (0u64..).zip([TRAINING, DRILL, STANDARD, TRAINING, DRILL]) {
        let service = Arc::clone(&harness.service);
        let draws = if banner == STANDARD { 10 } else { 4 };
        let request = harness.request("p1", banner, draws, seed);
        handles.push(tokio::spawn(async move { service.pull(request).await }));
    }
    let mut new_slimes = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        new_slimes += outcome
            .entries()
            .iter()
            .filter(|entry| entry.item_id.as_str() == "slime" && entry.is_new)
            .count();
    }
    assert!(new_slimes <= 1, "slime granted as new {new_slimes} times");
    assert_eq!(harness.balance("p1", CurrencyKind::SummonScroll), 4);
    assert_eq!(harness.balance("p1", CurrencyKind::Gems), 0);
}
