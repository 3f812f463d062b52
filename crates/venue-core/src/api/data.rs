//! Data API client: read-only endpoints for trade/position history.
//!
//! All reads are idempotent and go through the shared rate limiter and
//! backoff helper. Field names mirror the venue's wire format; callers
//! normalize into `DetectedTrade` themselves (the Poller's job).

use super::rate_limit::DataApiLimiter;
use super::retry::{classify_status, retry_read};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct RawTrade {
    pub asset: String,
    #[serde(rename = "conditionId")]
    pub condition_id: Option<String>,
    pub side: String,
    pub size: String,
    pub price: String,
    pub timestamp: i64,
    pub outcome: Option<String>,
    #[serde(rename = "outcomeIndex")]
    pub outcome_index: Option<u32>,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    pub asset: String,
    #[serde(rename = "conditionId")]
    pub condition_id: String,
    pub size: Decimal,
    #[serde(rename = "avgPrice")]
    pub avg_price: Decimal,
    #[serde(rename = "curPrice")]
    pub cur_price: Decimal,
    pub outcome: String,
    #[serde(rename = "negativeRisk", default)]
    pub negative_risk: bool,
    #[serde(default)]
    pub redeemable: bool,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyWalletResponse {
    #[serde(rename = "proxyWallet")]
    proxy_wallet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

pub struct DataApiClient {
    base_url: String,
    http: reqwest::Client,
    limiter: Arc<DataApiLimiter>,
}

impl DataApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
            limiter: Arc::new(DataApiLimiter::new()),
        }
    }

    pub async fn get_user_trades(&self, address: &str, limit: u32) -> Result<Vec<RawTrade>> {
        let url = format!("{}/users/{}/trades?limit={}", self.base_url, address, limit);
        retry_read("get_user_trades", || self.get_json(&url)).await
    }

    pub async fn get_user_positions(&self, address: &str) -> Result<Vec<RawPosition>> {
        let url = format!("{}/users/{}/positions", self.base_url, address);
        retry_read("get_user_positions", || self.get_json(&url)).await
    }

    /// Open positions marked at current price, summed.
    pub async fn get_positions_value(&self, address: &str) -> Result<Decimal> {
        let positions = self.get_user_positions(address).await?;
        Ok(positions.iter().map(|p| p.size * p.cur_price).sum())
    }

    /// Free USDC collateral balance, separate from open-position value.
    pub async fn get_usdc_balance(&self, address: &str) -> Result<Decimal> {
        let url = format!("{}/users/{}/balance", self.base_url, address);
        let resp: BalanceResponse = retry_read("get_usdc_balance", || self.get_json(&url)).await?;
        Ok(resp.balance)
    }

    /// USDC balance plus open positions marked at current price.
    pub async fn get_portfolio_value(&self, address: &str) -> Result<Decimal> {
        let (balance, positions_value) =
            tokio::try_join!(self.get_usdc_balance(address), self.get_positions_value(address))?;
        Ok(balance + positions_value)
    }

    pub async fn get_proxy_wallet(&self, eoa: &str) -> Result<Option<String>> {
        let url = format!("{}/public-profile?address={}", self.base_url, eoa);
        let resp: ProxyWalletResponse = retry_read("get_proxy_wallet", || self.get_json(&url)).await?;
        Ok(resp.proxy_wallet)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.limiter.acquire().await;

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                Error::Transient(e.to_string())
            } else {
                Error::Http(e)
            }
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        if body.trim().is_empty() {
            return Err(Error::Protocol(format!("empty response body from {}", url)));
        }

        serde_json::from_str(&body).map_err(|e| Error::Protocol(format!("unexpected schema from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_trade_parses_minimal_fields() {
        let json = r#"{"asset":"111","side":"BUY","size":"100","price":"0.5","timestamp":1700000000}"#;
        let trade: RawTrade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.asset, "111");
        assert_eq!(trade.side, "BUY");
        assert!(trade.condition_id.is_none());
    }

    #[test]
    fn test_portfolio_value_sums_size_times_current_price() {
        let positions = vec![
            RawPosition {
                asset: "1".to_string(),
                condition_id: "m1".to_string(),
                size: Decimal::new(100, 0),
                avg_price: Decimal::new(40, 2),
                cur_price: Decimal::new(50, 2),
                outcome: "YES".to_string(),
                negative_risk: false,
                redeemable: false,
                title: None,
            },
            RawPosition {
                asset: "2".to_string(),
                condition_id: "m2".to_string(),
                size: Decimal::new(200, 0),
                avg_price: Decimal::new(20, 2),
                cur_price: Decimal::new(25, 2),
                outcome: "NO".to_string(),
                negative_risk: false,
                redeemable: false,
                title: None,
            },
        ];
        let total: Decimal = positions.iter().map(|p| p.size * p.cur_price).sum();
        assert_eq!(total, Decimal::new(10000, 2));
    }
}
