//! Debounced refresh and bucket aggregation through the client.

use std::sync::atomic::Ordering;
use std::time::Duration;

use alloy::primitives::U256;
use privacy_relay::balances::{BalanceBucket, RawBucketKey, RefreshOutcome, SkipReason, TokenAmount};
use privacy_relay::engine::EngineError;

mod common;
use common::{test_config, Harness, TOKEN};

fn amount(n: u64) -> Vec<TokenAmount> {
    vec![TokenAmount::new(TOKEN, U256::from(n))]
}

async fn connected(config: privacy_relay::RelayConfig) -> Harness {
    let h = Harness::new(config);
    h.engine.set_pushes(vec![
        (RawBucketKey::from("Spendable"), amount(5)),
        (RawBucketKey::from("ShieldPending"), amount(2)),
        (RawBucketKey::from(3u64), amount(1)),
        (RawBucketKey::from("ShieldBlocked"), amount(7)),
    ]);
    h.client.connect(h.chain.user()).await.unwrap();
    h
}

#[tokio::test]
async fn test_refresh_requires_connected_wallet() {
    let h = Harness::new(test_config());
    let outcome = h.client.refresh_balances(false, None).await;
    assert!(matches!(outcome, RefreshOutcome::Failed { .. }));
    assert_eq!(h.engine.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refresh_aggregates_pushed_buckets() {
    let h = connected(test_config()).await;

    let outcome = h.client.refresh_balances(false, None).await;
    let RefreshOutcome::Refreshed { summary, warning } = outcome else {
        panic!("expected refresh, got {:?}", outcome);
    };

    assert_eq!(warning, None);
    assert_eq!(summary.spendable_of(&TOKEN), U256::from(5));
    assert_eq!(summary.pending_of(&TOKEN), U256::from(3));
    assert_eq!(summary.display_spendable_of(&TOKEN), U256::from(8));
    assert!(summary.buckets.contains_key(&BalanceBucket::Blocked));
    assert_eq!(h.telemetry.updates.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_complete_poi_network_keeps_pending_separate() {
    let mut config = test_config();
    config.network.poi_incomplete = false;
    let h = connected(config).await;

    h.client.refresh_balances(false, None).await;
    let summary = h.client.get_balances();

    assert_eq!(summary.display_spendable_of(&TOKEN), U256::from(5));
    assert_eq!(summary.pending_of(&TOKEN), U256::from(3));
}

#[tokio::test]
async fn test_unknown_bucket_is_dropped() {
    let h = connected(test_config()).await;
    h.engine.set_pushes(vec![
        (RawBucketKey::from("Spendable"), amount(5)),
        (RawBucketKey::from("Mystery"), amount(9)),
        (RawBucketKey::from(42u64), amount(9)),
    ]);

    h.client.refresh_balances(true, None).await;
    let summary = h.client.get_balances();

    assert_eq!(summary.buckets.len(), 1);
    assert_eq!(summary.spendable_of(&TOKEN), U256::from(5));
}

#[tokio::test]
async fn test_debounce_and_force() {
    let h = connected(test_config()).await;

    assert!(h.client.refresh_balances(false, None).await.is_success());
    assert_eq!(
        h.client.refresh_balances(false, None).await,
        RefreshOutcome::Skipped {
            cause: SkipReason::Debounced
        }
    );
    assert!(h.client.refresh_balances(true, None).await.is_success());

    assert_eq!(h.engine.refresh_calls.load(Ordering::SeqCst), 2);
    assert_eq!(*h.telemetry.skipped.lock().unwrap(), vec![SkipReason::Debounced]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_window_expires() {
    let h = connected(test_config()).await;

    h.client.refresh_balances(false, None).await;
    tokio::time::advance(Duration::from_millis(5001)).await;

    assert!(h.client.refresh_balances(false, None).await.is_success());
    assert_eq!(h.engine.refresh_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_request_during_scan_is_skipped() {
    let h = connected(test_config()).await;
    *h.engine.refresh_delay.lock().unwrap() = Duration::from_secs(1);

    let (first, second) = tokio::join!(h.client.refresh_balances(false, None), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.client.refresh_balances(false, None).await
    });

    assert!(first.is_success());
    assert_eq!(
        second,
        RefreshOutcome::Skipped {
            cause: SkipReason::InFlight
        }
    );
    assert_eq!(h.engine.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_txid_sync_failure_tolerated_on_flagged_network() {
    let h = connected(test_config()).await;
    *h.engine.refresh_error.lock().unwrap() = Some(EngineError::TxidSyncFailed("tree behind".into()));

    let outcome = h.client.refresh_balances(true, None).await;
    let RefreshOutcome::Refreshed { warning, .. } = outcome else {
        panic!("expected tolerated refresh, got {:?}", outcome);
    };
    assert!(warning.unwrap().contains("tree behind"));
}

#[tokio::test]
async fn test_txid_sync_failure_fails_elsewhere() {
    let mut config = test_config();
    config.network.txid_sync_incomplete = false;
    let h = connected(config).await;
    *h.engine.refresh_error.lock().unwrap() = Some(EngineError::Refresh("txid merkletree sync".into()));

    let outcome = h.client.refresh_balances(true, None).await;
    assert!(matches!(outcome, RefreshOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_failed_scan_releases_coordinator() {
    let h = connected(test_config()).await;
    *h.engine.refresh_error.lock().unwrap() = Some(EngineError::Refresh("provider down".into()));

    let outcome = h.client.refresh_balances(false, None).await;
    assert_eq!(
        outcome,
        RefreshOutcome::Failed {
            error: "Balance refresh failed: provider down".into()
        }
    );

    *h.engine.refresh_error.lock().unwrap() = None;
    assert!(h.client.refresh_balances(true, None).await.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_slow_scan_trips_watchdog_once() {
    let mut config = test_config();
    config.refresh.scan_watchdog_secs = 1;
    let h = connected(config).await;
    *h.engine.refresh_delay.lock().unwrap() = Duration::from_secs(5);

    let outcome = h.client.refresh_balances(true, None).await;

    assert!(outcome.is_success());
    assert_eq!(h.telemetry.watchdog.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disconnect_clears_balances() {
    let h = connected(test_config()).await;
    h.client.refresh_balances(false, None).await;
    assert!(!h.client.get_balances().buckets.is_empty());

    h.client.disconnect().unwrap();
    assert!(h.client.get_balances().buckets.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_forced_scan_keeps_coordinator_busy() {
    let mut config = test_config();
    config.refresh.debounce_ms = 0;
    let h = connected(config).await;
    *h.engine.refresh_delay.lock().unwrap() = Duration::from_secs(1);

    let (first, forced, late) = tokio::join!(
        h.client.refresh_balances(false, None),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.client.refresh_balances(true, None).await
        },
        async {
            // first scan done, forced scan still running
            tokio::time::sleep(Duration::from_millis(1005)).await;
            h.client.refresh_balances(false, None).await
        }
    );

    assert!(first.is_success());
    assert!(forced.is_success());
    assert_eq!(
        late,
        RefreshOutcome::Skipped {
            cause: SkipReason::InFlight
        }
    );
    assert_eq!(h.engine.refresh_calls.load(Ordering::SeqCst), 2);
}
