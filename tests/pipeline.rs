//! End-to-end coverage of the detect -> policy -> execute pipeline, wired
//! the same way `src/main.rs` wires it but against an in-memory store and
//! a venue client pointed at nothing (dry-run only, no network I/O).

use std::sync::Arc;

use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use execution_engine::{Coordinator, Executor, ExecutorConfig};
use policy_engine::{PolicyEngine, StopLossConfig, StopLossGuard};
use rust_decimal::Decimal;
use venue_core::api::{ClobApiClient, DataApiClient, VenueClient};
use venue_core::signing::OrderSigner;
use venue_core::types::order::{DetectedTrade, OrderSide, OutcomeSide};
use venue_core::types::wallet::{PerWalletPolicy, SideFilter, SizingMode};
use wallet_store::{InMemoryStorage, Storage};

const OPERATOR: &str = "0xoperator";
const TRACKED: &str = "0xtracked";

fn test_venue() -> Arc<VenueClient> {
    let pk = PrivateKeySigner::random();
    let signer = OrderSigner::new(pk.clone());
    Arc::new(VenueClient {
        data: DataApiClient::new("http://unused.invalid".to_string()),
        clob: ClobApiClient::new("http://unused.invalid".to_string(), signer, None),
        signer_address: Signer::address(&pk),
    })
}

async fn build_pipeline(default_trade_size_usd: Decimal, stop_loss: StopLossConfig) -> (Arc<dyn Storage>, Coordinator) {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    storage.add_wallet(TRACKED).await.unwrap();

    let venue = test_venue();
    let policy = Arc::new(PolicyEngine::new(
        storage.clone(),
        venue.clone(),
        StopLossGuard::new(stop_loss),
        default_trade_size_usd,
        OPERATOR.to_string(),
    ));
    let executor = Arc::new(Executor::new(venue, ExecutorConfig { live_trading: false }));
    let coordinator = Coordinator::new(storage.clone(), policy, executor);
    (storage, coordinator)
}

fn trade(hash: &str, price: Decimal, size: Decimal) -> DetectedTrade {
    DetectedTrade {
        source_wallet: TRACKED.to_string(),
        market_id: "market-1".to_string(),
        asset: "111".to_string(),
        outcome: OutcomeSide::Yes,
        side: OrderSide::Buy,
        size,
        price,
        timestamp: chrono::Utc::now(),
        transaction_hash: hash.to_string(),
        neg_risk: false,
        policy_snapshot: PerWalletPolicy::default(),
    }
}

fn no_stop_loss() -> StopLossConfig {
    StopLossConfig { enabled: false, max_commitment_percent: Decimal::new(80, 0) }
}

/// Scenario 1: fixed-size sizing with a generous minimum-order floor
/// produces an accepted order and a ledger entry.
#[tokio::test]
async fn test_happy_path_fixed_size_produces_executed_metric() {
    let (storage, coordinator) = build_pipeline(Decimal::new(25, 0), no_stop_loss()).await;
    coordinator.initialize(24).await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(trade("0xhash1", Decimal::new(40, 2), Decimal::new(200, 0))).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    let metrics = coordinator.recent_metrics().await;
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].outcome_kind, venue_core::types::order::OrderOutcomeKind::Executed);

    assert!(storage.is_position_blocked("market-1", OutcomeSide::Yes, chrono::Duration::minutes(5)).await.unwrap());
}

/// Scenario 2 (P2/P3): a cross-source duplicate with a different tx hash
/// but the same wallet/market/outcome/side/bucket must not produce a
/// second order.
#[tokio::test]
async fn test_cross_source_duplicate_suppressed_by_compound_key() {
    let (_storage, coordinator) = build_pipeline(Decimal::new(25, 0), no_stop_loss()).await;
    coordinator.initialize(24).await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let t1 = trade("0xhash-a", Decimal::new(40, 2), Decimal::new(200, 0));
    let mut t2 = trade("0xhash-b", Decimal::new(40, 2), Decimal::new(200, 0));
    t2.timestamp = t1.timestamp;
    tx.send(t1).await.unwrap();
    tx.send(t2).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    assert_eq!(coordinator.recent_metrics().await.len(), 1);
}

/// Scenario 4 (P6): an active global stop-loss rejects every trade and
/// never reaches the Executor, so no metric is recorded as executed.
#[tokio::test]
async fn test_stop_loss_rejects_without_reaching_executor() {
    let stop_loss = StopLossConfig { enabled: true, max_commitment_percent: Decimal::ZERO };
    let (storage, coordinator) = build_pipeline(Decimal::new(25, 0), stop_loss).await;
    coordinator.initialize(24).await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(trade("0xhash-stop", Decimal::new(40, 2), Decimal::new(200, 0))).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    assert!(coordinator.recent_metrics().await.is_empty());
    assert!(!storage.is_position_blocked("market-1", OutcomeSide::Yes, chrono::Duration::minutes(5)).await.unwrap());
}

/// Scenario 5: a SELL with no corresponding position is rejected by the
/// ownership check, not treated as a system error.
#[tokio::test]
async fn test_sell_without_ownership_produces_no_order_and_no_issue() {
    let (_storage, coordinator) = build_pipeline(Decimal::new(25, 0), no_stop_loss()).await;
    coordinator.initialize(24).await.unwrap();

    let mut sell = trade("0xhash-sell", Decimal::new(40, 2), Decimal::new(200, 0));
    sell.side = OrderSide::Sell;

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(sell).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    assert!(coordinator.recent_metrics().await.is_empty());
    assert!(coordinator.recent_issues().await.is_empty());
}

/// P1: once a wallet is no longer active, its trades are rejected before
/// the Executor is ever invoked.
#[tokio::test]
async fn test_untracked_wallet_never_reaches_executor() {
    let (storage, coordinator) = build_pipeline(Decimal::new(25, 0), no_stop_loss()).await;
    storage.set_active(TRACKED, false).await.unwrap();
    coordinator.initialize(24).await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(trade("0xhash-inactive", Decimal::new(40, 2), Decimal::new(200, 0))).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    assert!(coordinator.recent_metrics().await.is_empty());
}

/// A buy-only side filter rejects a SELL cleanly, independent of
/// ownership or sizing.
#[tokio::test]
async fn test_side_filter_rejects_disallowed_side() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    storage.add_wallet(TRACKED).await.unwrap();
    storage
        .update_wallet_policy(TRACKED, PerWalletPolicy { side_filter: SideFilter::BuyOnly, ..PerWalletPolicy::default() })
        .await
        .unwrap();

    let venue = test_venue();
    let policy = Arc::new(PolicyEngine::new(
        storage.clone(),
        venue.clone(),
        StopLossGuard::new(no_stop_loss()),
        Decimal::new(25, 0),
        OPERATOR.to_string(),
    ));
    let executor = Arc::new(Executor::new(venue, ExecutorConfig { live_trading: false }));
    let coordinator = Coordinator::new(storage, policy, executor);
    coordinator.initialize(24).await.unwrap();

    let mut sell = trade("0xhash-buyonly", Decimal::new(40, 2), Decimal::new(200, 0));
    sell.side = OrderSide::Sell;
    sell.policy_snapshot = PerWalletPolicy { side_filter: SideFilter::BuyOnly, ..PerWalletPolicy::default() };

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(sell).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    assert!(coordinator.recent_metrics().await.is_empty());
}

/// A fixed trade size too small to clear the venue's minimum order size
/// is rejected at the minimum-order step rather than submitted undersized.
#[tokio::test]
async fn test_fixed_trade_below_minimum_order_size_is_rejected() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    storage.add_wallet(TRACKED).await.unwrap();
    let tiny = PerWalletPolicy { sizing_mode: SizingMode::Fixed, fixed_trade_size: Some(Decimal::new(1, 0)), ..PerWalletPolicy::default() };
    storage.update_wallet_policy(TRACKED, tiny.clone()).await.unwrap();

    let venue = test_venue();
    let policy = Arc::new(PolicyEngine::new(
        storage.clone(),
        venue.clone(),
        StopLossGuard::new(no_stop_loss()),
        Decimal::new(25, 0),
        OPERATOR.to_string(),
    ));
    let executor = Arc::new(Executor::new(venue, ExecutorConfig { live_trading: false }));
    let coordinator = Coordinator::new(storage, policy, executor);
    coordinator.initialize(24).await.unwrap();

    let mut t = trade("0xhash-tiny", Decimal::new(40, 2), Decimal::new(200, 0));
    t.policy_snapshot = tiny;

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(t).await.unwrap();
    drop(tx);
    coordinator.run(rx).await;

    assert!(coordinator.recent_metrics().await.is_empty());
}
