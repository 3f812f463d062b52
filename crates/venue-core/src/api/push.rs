//! Optional push subscription. Runs alongside the Poller rather than
//! replacing it, because the push source may key trades by a different
//! address variant (e.g. proxy wallet) than some tracked wallets use.

use crate::types::order::{DetectedTrade, OrderSide, OutcomeSide};
use crate::types::wallet::PerWalletPolicy;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
}

const BACKOFF: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

/// Maintains a persistent push subscription, reconnecting with backoff on
/// disconnect. The caller keeps the `trade_rx` end; `state_rx` observes
/// connection lifecycle without polling.
pub struct PushStream {
    ws_url: String,
}

impl PushStream {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// Spawn the connect/reconnect loop for the given address set, returning
    /// the trade receiver and a lifecycle-state watch.
    pub fn start(
        self,
        addresses: HashSet<String>,
    ) -> (mpsc::Receiver<DetectedTrade>, watch::Receiver<StreamState>) {
        let (trade_tx, trade_rx) = mpsc::channel(1000);
        let (state_tx, state_rx) = watch::channel(StreamState::Disconnected);

        tokio::spawn(async move {
            let mut attempt = 0usize;
            loop {
                let _ = state_tx.send(StreamState::Connecting);
                match run_once(&self.ws_url, &addresses, &trade_tx, &state_tx).await {
                    Ok(()) => attempt = 0,
                    Err(e) => warn!(error = %e, "push stream disconnected"),
                }

                let _ = state_tx.send(StreamState::Disconnected);
                if trade_tx.is_closed() {
                    break;
                }

                let delay = BACKOFF[attempt.min(BACKOFF.len() - 1)];
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        });

        (trade_rx, state_rx)
    }
}

async fn run_once(
    ws_url: &str,
    addresses: &HashSet<String>,
    trade_tx: &mpsc::Sender<DetectedTrade>,
    state_tx: &watch::Sender<StreamState>,
) -> anyhow::Result<()> {
    let (ws_stream, _) = connect_async(ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe_msg = serde_json::json!({
        "type": "subscribe",
        "channel": "trades",
        "addresses": addresses.iter().collect::<Vec<_>>(),
    });
    write.send(Message::Text(subscribe_msg.to_string())).await?;

    let _ = state_tx.send(StreamState::Connected);
    info!(addresses = addresses.len(), "push stream connected");

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(trade) = parse_push_trade(&text, addresses) {
                    if trade_tx.send(trade).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
            }
            Ok(Message::Close(_)) => {
                info!("push stream closed by server");
                break;
            }
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PushMessage {
    Trade {
        #[serde(rename = "makerAddress")]
        maker_address: String,
        #[serde(rename = "conditionId")]
        condition_id: String,
        asset: String,
        side: String,
        size: String,
        price: String,
        timestamp: i64,
        outcome: Option<String>,
        #[serde(rename = "transactionHash")]
        transaction_hash: Option<String>,
        #[serde(default, rename = "negRisk")]
        neg_risk: bool,
    },
    #[serde(other)]
    Other,
}

fn parse_push_trade(text: &str, addresses: &HashSet<String>) -> Option<DetectedTrade> {
    let msg: PushMessage = serde_json::from_str(text).ok()?;
    let PushMessage::Trade {
        maker_address,
        condition_id,
        asset,
        side,
        size,
        price,
        timestamp,
        outcome,
        transaction_hash,
        neg_risk,
    } = msg
    else {
        return None;
    };

    if !addresses.contains(&maker_address.to_lowercase()) {
        return None;
    }

    let side = OrderSide::parse(&side)?;
    let outcome = match outcome.as_deref() {
        Some(o) if o.eq_ignore_ascii_case("yes") => OutcomeSide::Yes,
        Some(o) if o.eq_ignore_ascii_case("no") => OutcomeSide::No,
        _ => OutcomeSide::No,
    };
    let size: rust_decimal::Decimal = size.parse().ok()?;
    let price: rust_decimal::Decimal = price.parse().ok()?;
    let ts = if timestamp > 10_000_000_000 { timestamp / 1000 } else { timestamp };

    Some(DetectedTrade {
        source_wallet: maker_address.to_lowercase(),
        market_id: condition_id,
        asset,
        outcome,
        side,
        size,
        price,
        timestamp: chrono::DateTime::from_timestamp(ts, 0).unwrap_or_else(chrono::Utc::now),
        transaction_hash: transaction_hash.unwrap_or_else(|| format!("push-{}-{}", ts, rand_suffix())),
        neg_risk,
        policy_snapshot: PerWalletPolicy::default(),
    })
}

fn rand_suffix() -> u32 {
    use rand::Rng;
    rand::rng().random()
}
