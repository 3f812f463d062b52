//! Polls the Data API for each tracked wallet's recent trades, normalizes
//! the venue's loose wire format into `DetectedTrade`, and fans the result
//! out over a broadcast channel for the Detector to merge with the push
//! stream.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use venue_core::api::{DataApiClient, RawTrade};
use venue_core::types::order::{DetectedTrade, OrderSide, OutcomeSide};
use venue_core::types::wallet::PerWalletPolicy;

/// A trade older than this relative to poll time is assumed to be a stale
/// replay (already seen on a prior poll) and is dropped before emission.
const RECENCY_WINDOW: chrono::Duration = chrono::Duration::minutes(5);

/// Above this notional, `size` is assumed to be expressed in base units
/// (e.g. 10^6 USDC units) rather than whole shares, and is corrected down.
const BASE_UNIT_NOTIONAL_THRESHOLD: i64 = 10_000_000;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub trades_per_wallet: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(5), trades_per_wallet: 20 }
    }
}

/// Per-wallet policy snapshot supplied by the caller (wallet-store has no
/// opinion on storage backend); refreshed on every poll tick.
pub type PolicyLookup = Arc<dyn Fn(&str) -> Option<PerWalletPolicy> + Send + Sync>;

pub struct Poller {
    data: Arc<DataApiClient>,
    config: PollerConfig,
    wallets: Arc<RwLock<HashSet<String>>>,
    policy_lookup: PolicyLookup,
    last_seen_hash: DashMap<String, HashSet<String>>,
    trade_tx: broadcast::Sender<DetectedTrade>,
    active: Arc<RwLock<bool>>,
}

impl Poller {
    pub fn new(data: Arc<DataApiClient>, config: PollerConfig, policy_lookup: PolicyLookup) -> Self {
        let (trade_tx, _) = broadcast::channel(1000);
        Self {
            data,
            config,
            wallets: Arc::new(RwLock::new(HashSet::new())),
            policy_lookup,
            last_seen_hash: DashMap::new(),
            trade_tx,
            active: Arc::new(RwLock::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DetectedTrade> {
        self.trade_tx.subscribe()
    }

    pub async fn set_wallets(&self, addresses: HashSet<String>) {
        *self.wallets.write().await = addresses.into_iter().map(|a| a.to_lowercase()).collect();
    }

    pub async fn is_active(&self) -> bool {
        *self.active.read().await
    }

    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let data = self.data.clone();
        let config = self.config.clone();
        let wallets = self.wallets.clone();
        let policy_lookup = self.policy_lookup.clone();
        let last_seen_hash = self.last_seen_hash.clone();
        let trade_tx = self.trade_tx.clone();
        let active = self.active.clone();

        tokio::spawn(async move {
            *active.write().await = true;
            let mut interval = tokio::time::interval(config.poll_interval);
            loop {
                interval.tick().await;
                if !*active.read().await {
                    break;
                }

                let current: Vec<String> = wallets.read().await.iter().cloned().collect();
                for address in current {
                    match poll_wallet(&data, &address, config.trades_per_wallet, &last_seen_hash).await {
                        Ok(trades) => {
                            for raw in trades {
                                let Some(policy) = policy_lookup(&address) else { continue };
                                match normalize_trade(raw, &address, policy) {
                                    Some(trade) => {
                                        let _ = trade_tx.send(trade);
                                    }
                                    None => debug!(wallet = %address, "dropped unnormalizable trade"),
                                }
                            }
                        }
                        Err(e) => warn!(wallet = %address, error = %e, "poll failed"),
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        })
    }

    pub async fn stop(&self) {
        *self.active.write().await = false;
    }
}

async fn poll_wallet(
    data: &DataApiClient,
    address: &str,
    limit: u32,
    last_seen_hash: &DashMap<String, HashSet<String>>,
) -> venue_core::Result<Vec<RawTrade>> {
    let trades = data.get_user_trades(address, limit).await?;

    let mut seen = last_seen_hash.entry(address.to_string()).or_default();
    let fresh: Vec<RawTrade> = trades
        .into_iter()
        .filter(|t| {
            let key = t
                .transaction_hash
                .clone()
                .or_else(|| t.id.clone())
                .unwrap_or_else(|| format!("{}-{}-{}", t.asset, t.timestamp, t.price));
            seen.insert(key)
        })
        .collect();

    // bound memory: a wallet with high turnover shouldn't grow this set forever
    if seen.len() > 5000 {
        let keep: HashSet<String> = seen.iter().rev().take(1000).cloned().collect();
        *seen = keep;
    }

    Ok(fresh)
}

/// Implements the venue's loose wire-format normalization: market id
/// fallback, outcome derivation, side validation, base-unit size
/// correction, and the recency window. Returns `None` for anything that
/// doesn't survive validation rather than propagating an error, since a
/// single malformed trade must never halt polling for the rest.
fn normalize_trade(raw: RawTrade, wallet: &str, policy: PerWalletPolicy) -> Option<DetectedTrade> {
    let market_id = raw.condition_id.clone().unwrap_or_else(|| raw.asset.clone());

    let outcome = match raw.outcome.as_deref() {
        Some(o) if o.eq_ignore_ascii_case("yes") => OutcomeSide::Yes,
        Some(o) if o.eq_ignore_ascii_case("no") => OutcomeSide::No,
        _ => match raw.outcome_index {
            Some(0) => OutcomeSide::Yes,
            Some(_) => OutcomeSide::No,
            None => return None,
        },
    };

    let side = OrderSide::parse(&raw.side)?;

    let mut price = Decimal::from_str(&raw.price).ok()?;
    if price <= Decimal::ZERO || price >= Decimal::ONE {
        return None;
    }

    let mut size = Decimal::from_str(&raw.size).ok()?;
    if size <= Decimal::ZERO {
        return None;
    }
    if size * price > Decimal::new(BASE_UNIT_NOTIONAL_THRESHOLD, 0) {
        warn!(wallet, market_id, "correcting base-unit trade size");
        size /= Decimal::new(1_000_000, 0);
    }
    // price is re-checked after the correction in case both fields were off
    if price <= Decimal::ZERO {
        price = Decimal::new(1, 2);
    }

    let ts_secs = if raw.timestamp > 10_000_000_000 { raw.timestamp / 1000 } else { raw.timestamp };
    let timestamp: DateTime<Utc> = DateTime::from_timestamp(ts_secs, 0)?;

    if Utc::now().signed_duration_since(timestamp) > RECENCY_WINDOW {
        return None;
    }

    let transaction_hash = raw
        .transaction_hash
        .clone()
        .or_else(|| raw.id.clone())
        .unwrap_or_else(|| format!("trade-{}-{}", ts_secs, rand_suffix()));

    Some(DetectedTrade {
        source_wallet: wallet.to_lowercase(),
        market_id,
        asset: raw.asset,
        outcome,
        side,
        size,
        price,
        timestamp,
        transaction_hash,
        neg_risk: false,
        policy_snapshot: policy,
    })
}

fn rand_suffix() -> u32 {
    use rand::Rng;
    rand::rng().random()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_trade(overrides: impl FnOnce(&mut RawTrade)) -> RawTrade {
        let mut t = RawTrade {
            asset: "123".to_string(),
            condition_id: Some("m1".to_string()),
            side: "BUY".to_string(),
            size: "10".to_string(),
            price: "0.5".to_string(),
            timestamp: Utc::now().timestamp(),
            outcome: Some("Yes".to_string()),
            outcome_index: None,
            transaction_hash: Some("0xabc".to_string()),
            id: None,
        };
        overrides(&mut t);
        t
    }

    #[test]
    fn test_normalize_trade_happy_path() {
        let raw = raw_trade(|_| {});
        let trade = normalize_trade(raw, "0xWALLET", PerWalletPolicy::default()).unwrap();
        assert_eq!(trade.market_id, "m1");
        assert_eq!(trade.outcome, OutcomeSide::Yes);
        assert_eq!(trade.source_wallet, "0xwallet");
    }

    #[test]
    fn test_normalize_trade_falls_back_to_asset_when_condition_id_missing() {
        let raw = raw_trade(|t| t.condition_id = None);
        let trade = normalize_trade(raw, "0xw", PerWalletPolicy::default()).unwrap();
        assert_eq!(trade.market_id, "123");
    }

    #[test]
    fn test_normalize_trade_derives_outcome_from_index_when_name_absent() {
        let raw = raw_trade(|t| {
            t.outcome = None;
            t.outcome_index = Some(0);
        });
        let trade = normalize_trade(raw, "0xw", PerWalletPolicy::default()).unwrap();
        assert_eq!(trade.outcome, OutcomeSide::Yes);
    }

    #[test]
    fn test_normalize_trade_rejects_invalid_side() {
        let raw = raw_trade(|t| t.side = "HOLD".to_string());
        assert!(normalize_trade(raw, "0xw", PerWalletPolicy::default()).is_none());
    }

    #[test]
    fn test_normalize_trade_rejects_out_of_range_price() {
        let raw = raw_trade(|t| t.price = "1.5".to_string());
        assert!(normalize_trade(raw, "0xw", PerWalletPolicy::default()).is_none());
    }

    #[test]
    fn test_normalize_trade_corrects_base_unit_size() {
        let raw = raw_trade(|t| t.size = "50000000".to_string());
        let trade = normalize_trade(raw, "0xw", PerWalletPolicy::default()).unwrap();
        assert_eq!(trade.size, Decimal::new(50, 0));
    }

    #[test]
    fn test_normalize_trade_rejects_stale_timestamp() {
        let raw = raw_trade(|t| t.timestamp = (Utc::now() - chrono::Duration::hours(1)).timestamp());
        assert!(normalize_trade(raw, "0xw", PerWalletPolicy::default()).is_none());
    }

    #[test]
    fn test_normalize_trade_accepts_ms_timestamp() {
        let ms = Utc::now().timestamp_millis();
        let raw = raw_trade(|t| t.timestamp = ms);
        let trade = normalize_trade(raw, "0xw", PerWalletPolicy::default()).unwrap();
        assert!(Utc::now().signed_duration_since(trade.timestamp) < chrono::Duration::minutes(1));
    }

    #[test]
    fn test_normalize_trade_synthesizes_hash_when_absent() {
        let raw = raw_trade(|t| t.transaction_hash = None);
        let trade = normalize_trade(raw, "0xw", PerWalletPolicy::default()).unwrap();
        assert!(trade.transaction_hash.starts_with("trade-"));
    }
}
