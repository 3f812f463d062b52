//! Owns the Detector→PolicyEngine→Executor pipeline: cross-source
//! deduplication, in-flight tracking, ledger/rate-limit bookkeeping on
//! outcome, and the run/reload/stop lifecycle.
//!
//! `byTxHash`/`byCompound`/`inFlight` are `DashMap`s rather than
//! `Arc<RwLock<HashSet<_>>>` because `DashMap`'s per-shard locking gives the
//! "insert before the first await" requirement below without a single
//! coarse lock serializing unrelated trades.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use venue_core::types::order::{DetectedTrade, OrderOutcomeKind, TradeResult};
use wallet_store::Storage;

use crate::executor::Executor;
use policy_engine::{FilterOutcome, PolicyEngine};

const TX_HASH_TTL_SECS: i64 = 60 * 60;
const COMPOUND_TTL_SECS: i64 = 5 * 60;
const METRICS_CAP: usize = 1000;
const ISSUES_CAP: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Initialized,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct TradeMetric {
    pub market_id: String,
    pub side: String,
    pub outcome_kind: OrderOutcomeKind,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SystemIssue {
    pub market_id: String,
    pub message: String,
}

/// RAII guard removing both the tx-hash and compound key from `inFlight`
/// on drop, so cleanup runs even on early-return or panic unwind.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    hash_key: String,
    compound_key: String,
}

impl<'a> Drop for InFlightGuard<'a> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.hash_key);
        self.in_flight.remove(&self.compound_key);
    }
}

pub struct Coordinator {
    storage: Arc<dyn Storage>,
    policy: Arc<PolicyEngine>,
    executor: Arc<Executor>,

    by_tx_hash: DashMap<String, i64>,
    by_compound: DashMap<String, i64>,
    in_flight: DashMap<String, ()>,

    trade_metrics: RwLock<VecDeque<TradeMetric>>,
    system_issues: RwLock<VecDeque<SystemIssue>>,

    state: RwLock<CoordinatorState>,
    now_secs: AtomicI64,
}

impl Coordinator {
    pub fn new(storage: Arc<dyn Storage>, policy: Arc<PolicyEngine>, executor: Arc<Executor>) -> Self {
        Self {
            storage,
            policy,
            executor,
            by_tx_hash: DashMap::new(),
            by_compound: DashMap::new(),
            in_flight: DashMap::new(),
            trade_metrics: RwLock::new(VecDeque::with_capacity(METRICS_CAP)),
            system_issues: RwLock::new(VecDeque::with_capacity(ISSUES_CAP)),
            state: RwLock::new(CoordinatorState::Idle),
            now_secs: AtomicI64::new(0),
        }
    }

    pub async fn state(&self) -> CoordinatorState {
        *self.state.read().await
    }

    /// Advances the logical clock used for dedup-map eviction. Pulled out
    /// as an explicit tick rather than reading `Utc::now()` inline so the
    /// eviction sweep and the insert timestamps agree within one call.
    fn tick_clock(&self) {
        self.now_secs.store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn now(&self) -> i64 {
        self.now_secs.load(Ordering::Relaxed)
    }

    pub async fn initialize(&self, longest_block_window_hours: u32) -> venue_core::Result<()> {
        self.tick_clock();
        let removed = self.storage.cleanup_expired_positions(longest_block_window_hours).await?;
        info!(removed, "cleaned up expired ledger entries on init");
        *self.state.write().await = CoordinatorState::Initialized;
        Ok(())
    }

    pub async fn mark_running(&self) {
        *self.state.write().await = CoordinatorState::Running;
    }

    pub async fn stop(&self) {
        *self.state.write().await = CoordinatorState::Stopping;
        // Dedup maps deliberately survive a stop/start cycle: restarting the
        // Coordinator (e.g. on credential rotation) must not re-admit trades
        // that were already processed in the last few minutes.
        *self.state.write().await = CoordinatorState::Stopped;
    }

    fn evict_expired(&self) {
        let now = self.now();
        self.by_tx_hash.retain(|_, ts| now - *ts <= TX_HASH_TTL_SECS);
        self.by_compound.retain(|_, ts| now - *ts <= COMPOUND_TTL_SECS);
    }

    async fn record_metric(&self, metric: TradeMetric) {
        let mut metrics = self.trade_metrics.write().await;
        if metrics.len() >= METRICS_CAP {
            metrics.pop_front();
        }
        metrics.push_back(metric);
    }

    async fn record_issue(&self, issue: SystemIssue) {
        let mut issues = self.system_issues.write().await;
        if issues.len() >= ISSUES_CAP {
            issues.pop_front();
        }
        issues.push_back(issue);
    }

    pub async fn recent_metrics(&self) -> Vec<TradeMetric> {
        self.trade_metrics.read().await.iter().cloned().collect()
    }

    pub async fn recent_issues(&self) -> Vec<SystemIssue> {
        self.system_issues.read().await.iter().cloned().collect()
    }

    /// Consumes the Detector's merged trade stream until the channel closes.
    pub async fn run(&self, mut trades: mpsc::Receiver<DetectedTrade>) {
        while let Some(trade) = trades.recv().await {
            self.handle_trade(trade).await;
        }
    }

    /// The numbered dedup/process/bookkeep protocol. Steps 1-4 (dedup
    /// checks and in-flight/tx-hash insertion) run synchronously before
    /// any `await`, so a burst of near-simultaneous duplicates can't all
    /// pass the check concurrently.
    async fn handle_trade(&self, trade: DetectedTrade) {
        self.tick_clock();
        self.evict_expired();

        let hash_key = trade.transaction_hash.clone();
        let compound_key = trade.compound_key();

        // 1-3: drop if already seen or currently being processed.
        if self.by_tx_hash.contains_key(&hash_key) {
            return;
        }
        if self.by_compound.contains_key(&compound_key) {
            return;
        }
        if self.in_flight.contains_key(&hash_key) || self.in_flight.contains_key(&compound_key) {
            return;
        }

        // 4: insert into in_flight and by_tx_hash before any suspension point.
        self.in_flight.insert(hash_key.clone(), ());
        self.in_flight.insert(compound_key.clone(), ());
        self.by_tx_hash.insert(hash_key.clone(), self.now());

        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            hash_key: hash_key.clone(),
            compound_key: compound_key.clone(),
        };

        // 5: run PolicyEngine, then Executor, inside the guarded scope.
        let result = self.process(&trade).await;
        drop(guard);

        match result {
            Some((true, order_outcome)) => {
                // 6: executed successfully.
                self.by_compound.insert(compound_key, self.now());
                if let Err(e) = self
                    .storage
                    .append_executed_position(&trade.market_id, trade.outcome, &trade.source_wallet, trade.timestamp)
                    .await
                {
                    warn!(error = %e, "failed to append executed position to ledger");
                }
                self.policy.rate_limiter().record_execution(&trade.source_wallet);
                self.record_metric(TradeMetric {
                    market_id: trade.market_id.clone(),
                    side: trade.side.to_string(),
                    outcome_kind: order_outcome.status,
                    execution_time_ms: order_outcome.execution_time_ms,
                })
                .await;
                info!(market = %trade.market_id, wallet = %trade.source_wallet, "trade replicated");
            }
            Some((false, order_outcome)) if order_outcome.status == OrderOutcomeKind::MarketClosed => {
                // 7: market closed, prevent retry within the compound window only.
                self.by_compound.insert(compound_key, self.now());
                self.record_metric(TradeMetric {
                    market_id: trade.market_id.clone(),
                    side: trade.side.to_string(),
                    outcome_kind: order_outcome.status,
                    execution_time_ms: order_outcome.execution_time_ms,
                })
                .await;
            }
            Some((false, order_outcome)) => {
                // 8: other execution failure.
                self.by_compound.insert(compound_key, self.now());
                let message = order_outcome.error.clone().unwrap_or_else(|| "order failed".to_string());
                self.record_issue(SystemIssue { market_id: trade.market_id.clone(), message: message.clone() }).await;
                warn!(market = %trade.market_id, reason = %message, "order execution failed");
            }
            None => {
                // policy rejection: not a failure worth retry-blocking beyond
                // the dedup window already enforced by tx-hash/in-flight.
                self.by_compound.insert(compound_key, self.now());
            }
        }
    }

    async fn process(&self, trade: &DetectedTrade) -> Option<(bool, TradeResult)> {
        let order = match self.policy.evaluate(trade).await {
            FilterOutcome::Accept(order) => order,
            FilterOutcome::Reject(reason) => {
                info!(market = %trade.market_id, wallet = %trade.source_wallet, reason = %reason, "trade rejected by policy");
                return None;
            }
        };

        let result = self.executor.execute(&order).await;
        Some((result.success, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal as Dec;
    use venue_core::api::VenueClient;
    use venue_core::types::order::{OrderSide, OutcomeSide};
    use venue_core::types::wallet::PerWalletPolicy;
    use wallet_store::InMemoryStorage;
    use policy_engine::StopLossGuard;
    use policy_engine::StopLossConfig;

    fn sample_trade(hash: &str) -> DetectedTrade {
        DetectedTrade {
            source_wallet: "0xtracked".to_string(),
            market_id: "m1".to_string(),
            asset: "123".to_string(),
            outcome: OutcomeSide::Yes,
            side: OrderSide::Buy,
            size: Dec::new(10, 0),
            price: Dec::new(50, 2),
            timestamp: chrono::Utc::now(),
            transaction_hash: hash.to_string(),
            neg_risk: false,
            policy_snapshot: PerWalletPolicy::default(),
        }
    }

    async fn build_coordinator() -> Coordinator {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        storage.add_wallet("0xtracked").await.unwrap();

        use alloy_signer_local::PrivateKeySigner;
        use venue_core::signing::OrderSigner;
        let pk = PrivateKeySigner::random();
        let signer = OrderSigner::new(pk.clone());
        let venue = Arc::new(VenueClient {
            data: venue_core::api::DataApiClient::new("http://unused.invalid".to_string()),
            clob: venue_core::api::ClobApiClient::new("http://unused.invalid".to_string(), signer, None),
            signer_address: alloy_signer::Signer::address(&pk),
        });

        let stop_loss = StopLossGuard::new(StopLossConfig { enabled: false, max_commitment_percent: Dec::new(80, 0) });
        let policy = Arc::new(PolicyEngine::new(storage.clone(), venue.clone(), stop_loss, Dec::new(2, 0), "0xoperator".to_string()));
        let executor = Arc::new(Executor::new(venue, crate::executor::ExecutorConfig { live_trading: false }));

        Coordinator::new(storage, policy, executor)
    }

    #[tokio::test]
    async fn test_duplicate_tx_hash_is_dropped_before_processing() {
        let coordinator = build_coordinator().await;
        coordinator.tick_clock();

        coordinator.handle_trade(sample_trade("0xdup")).await;
        assert!(coordinator.by_tx_hash.contains_key("0xdup"));

        // second call with the same hash must be dropped at step 1, leaving
        // exactly one metric recorded despite two handle_trade calls.
        coordinator.handle_trade(sample_trade("0xdup")).await;
        let metrics = coordinator.recent_metrics().await;
        assert_eq!(metrics.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_guard_clears_keys_after_processing() {
        let coordinator = build_coordinator().await;
        coordinator.handle_trade(sample_trade("0xabc")).await;
        assert!(!coordinator.in_flight.contains_key("0xabc"));
    }

    #[tokio::test]
    async fn test_initialize_transitions_to_initialized() {
        let coordinator = build_coordinator().await;
        coordinator.initialize(24).await.unwrap();
        assert_eq!(coordinator.state().await, CoordinatorState::Initialized);
    }
}
