//! Order- and trade-shaped types that flow through the detection and
//! execution pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::wallet::PerWalletPolicy;

/// Side of a trade or order. Serializes uppercase to match the venue's wire
/// convention (`side ∈ {BUY, SELL}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Which binary outcome a trade or position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeSide {
    Yes,
    No,
}

impl std::fmt::Display for OutcomeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeSide::Yes => write!(f, "YES"),
            OutcomeSide::No => write!(f, "NO"),
        }
    }
}

/// An immutable, normalized record of a trade observed on a tracked wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedTrade {
    pub source_wallet: String,
    pub market_id: String,
    pub asset: String,
    pub outcome: OutcomeSide,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub neg_risk: bool,
    /// The wallet's policy as of the moment this trade was detected, so
    /// every downstream filter sees a consistent configuration.
    pub policy_snapshot: PerWalletPolicy,
}

impl DetectedTrade {
    /// The deduplication compound key bucketed to a 5-minute window.
    pub fn compound_key(&self) -> String {
        let bucket = self.timestamp.timestamp() / 300;
        format!(
            "{}|{}|{}|{}|{}",
            self.source_wallet.to_lowercase(),
            self.market_id,
            self.outcome,
            self.side,
            bucket
        )
    }

    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }
}

/// An order ready to submit to the venue, produced by the PolicyEngine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOrder {
    pub market_id: String,
    pub token_id: String,
    pub outcome: OutcomeSide,
    pub side: OrderSide,
    /// Rounded to 2 decimals.
    pub shares: Decimal,
    pub price: Decimal,
    pub slippage_percent: Decimal,
    pub tick_size: Decimal,
    pub neg_risk: bool,
}

/// Terminal classification of an order submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOutcomeKind {
    Executed,
    MarketClosed,
    Failed,
}

/// Result of attempting to execute a `TradeOrder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub success: bool,
    pub status: OrderOutcomeKind,
    pub order_id: Option<String>,
    pub transaction_hash: Option<String>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl TradeResult {
    pub fn executed(order_id: String, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            status: OrderOutcomeKind::Executed,
            order_id: Some(order_id),
            transaction_hash: None,
            error: None,
            execution_time_ms,
        }
    }

    pub fn market_closed(execution_time_ms: u64) -> Self {
        Self {
            success: false,
            status: OrderOutcomeKind::MarketClosed,
            order_id: None,
            transaction_hash: None,
            error: None,
            execution_time_ms,
        }
    }

    pub fn failed(error: String, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            status: OrderOutcomeKind::Failed,
            order_id: None,
            transaction_hash: None,
            error: Some(error),
            execution_time_ms,
        }
    }
}

/// A line in the append-only executed-position ledger, used by the
/// no-repeat filter across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedPositionEntry {
    pub id: Uuid,
    pub market_id: String,
    pub outcome: OutcomeSide,
    pub source_wallet: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::wallet::PerWalletPolicy;

    fn trade_at(ts: DateTime<Utc>) -> DetectedTrade {
        DetectedTrade {
            source_wallet: "0xAAA".to_string(),
            market_id: "market-1".to_string(),
            asset: "111".to_string(),
            outcome: OutcomeSide::Yes,
            side: OrderSide::Buy,
            size: Decimal::new(100, 0),
            price: Decimal::new(50, 2),
            timestamp: ts,
            transaction_hash: "0xhash".to_string(),
            neg_risk: false,
            policy_snapshot: PerWalletPolicy::default(),
        }
    }

    #[test]
    fn test_order_side_parses_case_insensitively() {
        assert_eq!(OrderSide::parse("buy"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::parse("SELL"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::parse("hold"), None);
    }

    #[test]
    fn test_compound_key_is_stable_within_same_five_minute_bucket() {
        use chrono::TimeZone;
        let t1 = trade_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let t2 = trade_at(Utc.timestamp_opt(1_700_000_100, 0).unwrap());
        assert_eq!(t1.compound_key(), t2.compound_key());

        let t3 = trade_at(Utc.timestamp_opt(1_700_000_600, 0).unwrap());
        assert_ne!(t1.compound_key(), t3.compound_key());
    }

    #[test]
    fn test_notional_is_size_times_price() {
        let trade = trade_at(Utc::now());
        assert_eq!(trade.notional(), Decimal::new(5000, 2));
    }

    #[test]
    fn test_side_display_is_uppercase() {
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
        assert_eq!(OutcomeSide::No.to_string(), "NO");
    }
}
