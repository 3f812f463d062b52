//! Market metadata types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A prediction market with its two binary outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub condition_id: String,
    pub question: String,
    pub outcomes: Vec<Outcome>,
    /// Minimum price increment accepted by the order book.
    pub tick_size: Decimal,
    /// Whether this market uses the venue's negative-risk adapter.
    pub neg_risk: bool,
    pub resolved: bool,
}

impl Market {
    /// Token id for the named outcome ("YES" / "NO"), if present.
    pub fn token_id_for(&self, outcome: &str) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(outcome))
            .map(|o| o.token_id.as_str())
    }
}

/// A single outcome (YES or NO) within a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub token_id: String,
    /// Smallest order size the venue accepts for this token, in shares.
    pub min_order_size: Decimal,
}

/// Real-time order book for a single token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub token_id: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }
}

/// A single price level in the order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_market() -> Market {
        Market {
            condition_id: "0xabc".to_string(),
            question: "Will it rain tomorrow?".to_string(),
            outcomes: vec![
                Outcome {
                    name: "YES".to_string(),
                    token_id: "111".to_string(),
                    min_order_size: Decimal::new(5, 0),
                },
                Outcome {
                    name: "NO".to_string(),
                    token_id: "222".to_string(),
                    min_order_size: Decimal::new(5, 0),
                },
            ],
            tick_size: Decimal::new(1, 2),
            neg_risk: false,
            resolved: false,
        }
    }

    #[test]
    fn test_token_id_lookup_is_case_insensitive() {
        let market = sample_market();
        assert_eq!(market.token_id_for("yes"), Some("111"));
        assert_eq!(market.token_id_for("NO"), Some("222"));
        assert_eq!(market.token_id_for("maybe"), None);
    }

    #[test]
    fn test_order_book_best_levels() {
        let book = OrderBook {
            token_id: "111".to_string(),
            timestamp: Utc::now(),
            bids: vec![PriceLevel {
                price: Decimal::new(45, 2),
                size: Decimal::new(100, 0),
            }],
            asks: vec![PriceLevel {
                price: Decimal::new(48, 2),
                size: Decimal::new(100, 0),
            }],
        };

        assert_eq!(book.best_bid(), Some(Decimal::new(45, 2)));
        assert_eq!(book.best_ask(), Some(Decimal::new(48, 2)));
    }

    #[test]
    fn test_empty_order_book_has_no_best_levels() {
        let book = OrderBook {
            token_id: "111".to_string(),
            timestamp: Utc::now(),
            bids: vec![],
            asks: vec![],
        };
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
    }
}
