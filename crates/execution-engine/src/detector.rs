//! Merges the Poller and PushStream into a single trade sequence for the
//! Coordinator. No filtering or dedup lives here — the Coordinator owns
//! that. PushStream-sourced trades carry a placeholder policy snapshot
//! (it has no Storage access), so this is also where that gets overwritten
//! with the real per-wallet policy before the trade is forwarded.

use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use venue_core::types::order::DetectedTrade;
use wallet_store::PolicyLookup;

/// Runs until both source channels close, forwarding every trade it sees
/// onto `out`. Intended to be spawned once per Coordinator run.
pub async fn run(
    mut poller_rx: broadcast::Receiver<DetectedTrade>,
    mut push_rx: mpsc::Receiver<DetectedTrade>,
    policy_lookup: PolicyLookup,
    out: mpsc::Sender<DetectedTrade>,
) {
    loop {
        tokio::select! {
            poller_trade = poller_rx.recv() => {
                match poller_trade {
                    Ok(trade) => {
                        if out.send(trade).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "detector lagged behind poller broadcast");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            push_trade = push_rx.recv() => {
                match push_trade {
                    Some(mut trade) => {
                        if let Some(policy) = policy_lookup(&trade.source_wallet) {
                            trade.policy_snapshot = policy;
                        }
                        if out.send(trade).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

pub fn spawn(
    poller_rx: broadcast::Receiver<DetectedTrade>,
    push_rx: mpsc::Receiver<DetectedTrade>,
    policy_lookup: PolicyLookup,
    out: mpsc::Sender<DetectedTrade>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(poller_rx, push_rx, policy_lookup, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use venue_core::types::order::{OrderSide, OutcomeSide};
    use venue_core::types::wallet::PerWalletPolicy;

    fn sample_trade(wallet: &str) -> DetectedTrade {
        DetectedTrade {
            source_wallet: wallet.to_string(),
            market_id: "m1".to_string(),
            asset: "123".to_string(),
            outcome: OutcomeSide::Yes,
            side: OrderSide::Buy,
            size: Decimal::new(10, 0),
            price: Decimal::new(50, 2),
            timestamp: chrono::Utc::now(),
            transaction_hash: "0xabc".to_string(),
            neg_risk: false,
            policy_snapshot: PerWalletPolicy::default(),
        }
    }

    #[tokio::test]
    async fn test_forwards_from_both_sources() {
        let (poller_tx, poller_rx) = broadcast::channel(10);
        let (push_tx, push_rx) = mpsc::channel(10);
        let (out_tx, mut out_rx) = mpsc::channel(10);

        let lookup: PolicyLookup = Arc::new(|_| Some(PerWalletPolicy::default()));
        let handle = spawn(poller_rx, push_rx, lookup, out_tx);

        poller_tx.send(sample_trade("0xaaa")).unwrap();
        push_tx.send(sample_trade("0xbbb")).await.unwrap();

        let first = out_rx.recv().await.unwrap();
        let second = out_rx.recv().await.unwrap();
        let wallets: Vec<_> = [first.source_wallet, second.source_wallet].into_iter().collect();
        assert!(wallets.contains(&"0xaaa".to_string()));
        assert!(wallets.contains(&"0xbbb".to_string()));

        drop(poller_tx);
        handle.abort();
    }

    #[tokio::test]
    async fn test_push_trade_gets_real_policy_snapshot() {
        let (_poller_tx, poller_rx) = broadcast::channel::<DetectedTrade>(10);
        let (push_tx, push_rx) = mpsc::channel(10);
        let (out_tx, mut out_rx) = mpsc::channel(10);

        let mut custom = PerWalletPolicy::default();
        custom.slippage_percent = Decimal::new(7, 0);
        let lookup: PolicyLookup = Arc::new(move |_| Some(custom.clone()));
        let handle = spawn(poller_rx, push_rx, lookup, out_tx);

        push_tx.send(sample_trade("0xccc")).await.unwrap();
        let trade = out_rx.recv().await.unwrap();
        assert_eq!(trade.policy_snapshot.slippage_percent, Decimal::new(7, 0));

        handle.abort();
    }
}
