//! Order-book (CLOB) API client: L2 credential derivation and order
//! submission. Reads here (`get_market`, `get_min_order_size`) go through
//! the same retry helper as the Data API; `place_order` never retries —
//! it is at-most-once.

use super::retry::{classify_status, retry_read};
use crate::signing::{OrderSide as SigningSide, OrderSigner};
use crate::types::order::OrderSide;
use crate::types::{Market, Outcome, TradeOrder};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Derived once at startup, reused for every order submitted during the run.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

/// Optional HMAC-signed "builder" headers attached to every order request.
#[derive(Debug, Clone)]
pub struct BuilderCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Outcome of submitting an order, before the Executor attaches timing.
pub enum PlaceOrderOutcome {
    Executed { order_id: String },
    MarketClosed,
    Failed(String),
}

pub struct ClobApiClient {
    base_url: String,
    http: reqwest::Client,
    signer: OrderSigner,
    neg_risk_signer: OrderSigner,
    credentials: RwLock<Option<ApiCredentials>>,
    builder: Option<BuilderCredentials>,
}

impl ClobApiClient {
    pub fn new(base_url: String, signer: OrderSigner, builder: Option<BuilderCredentials>) -> Self {
        let neg_risk_signer = signer.to_neg_risk();
        Self {
            base_url,
            http: reqwest::Client::new(),
            signer,
            neg_risk_signer,
            credentials: RwLock::new(None),
            builder,
        }
    }

    /// Derive L2 API credentials from the L1 signing key. Must succeed
    /// before any order can be placed; failure here is fatal at startup.
    pub async fn derive_api_credentials(&self) -> Result<()> {
        let timestamp = now_unix();
        let nonce = 0u64;
        let signature = self
            .signer
            .sign_clob_auth_message(timestamp, nonce)
            .await
            .map_err(|e| Error::Signing(e.to_string()))?;

        let url = format!("{}/auth/derive-api-key", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("POLY_ADDRESS", format!("{:?}", self.signer.address()))
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", timestamp.to_string())
            .header("POLY_NONCE", nonce.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let creds: DerivedCredsResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Protocol(format!("unexpected credential-derivation schema: {}", e)))?;

        *self.credentials.write().await = Some(ApiCredentials {
            api_key: creds.api_key,
            secret: creds.secret,
            passphrase: creds.passphrase,
        });

        Ok(())
    }

    pub async fn get_market(&self, market_id: &str) -> Result<Market> {
        let url = format!("{}/markets/{}", self.base_url, market_id);
        retry_read("get_market", || async {
            let response = self.http.get(&url).send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(classify_status(status, &body));
            }
            let raw: RawMarket = serde_json::from_str(&body)
                .map_err(|e| Error::Protocol(format!("unexpected market schema: {}", e)))?;
            Ok(raw.into())
        })
        .await
    }

    pub async fn get_min_order_size(&self, token_id: &str) -> Result<Decimal> {
        let url = format!("{}/min-order-size?token_id={}", self.base_url, token_id);
        retry_read("get_min_order_size", || async {
            let response = self.http.get(&url).send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(classify_status(status, &body));
            }
            let raw: MinOrderSizeResponse = serde_json::from_str(&body)
                .map_err(|e| Error::Protocol(format!("unexpected min-order-size schema: {}", e)))?;
            Ok(raw.min_order_size)
        })
        .await
        .or(Ok(Decimal::new(5, 0)))
    }

    /// Sign and submit a Good-Til-Cancelled limit order. Never retried.
    pub async fn place_order(&self, order: &TradeOrder, limit_price: Decimal) -> Result<PlaceOrderOutcome> {
        let creds = self.credentials.read().await.clone().ok_or_else(|| {
            Error::Fatal("place_order called before derive_api_credentials".to_string())
        })?;

        let signing_side = match order.side {
            OrderSide::Buy => SigningSide::Buy,
            OrderSide::Sell => SigningSide::Sell,
        };

        let token_id = order
            .token_id
            .parse::<alloy_primitives::U256>()
            .map_err(|e| Error::Protocol(format!("invalid token id {}: {}", order.token_id, e)))?;

        // Neg-risk markets redeem through a different contract and so sign
        // under a different EIP-712 domain; everything else about the order
        // is identical.
        let signer = if order.neg_risk { &self.neg_risk_signer } else { &self.signer };

        let built = signer
            .order_builder()
            .token_id(token_id)
            .side(signing_side)
            .price(limit_price)
            .size(order.shares * limit_price)
            .expires_in(0)
            .build()
            .ok_or_else(|| Error::Protocol("failed to build order from policy-computed fields".to_string()))?;

        let signed = signer.sign_order(&built).await.map_err(|e| Error::Signing(e.to_string()))?;

        let url = format!("{}/order", self.base_url);
        let mut request = self
            .http
            .post(&url)
            .header("POLY_API_KEY", &creds.api_key)
            .header("POLY_PASSPHRASE", &creds.passphrase)
            .json(&OrderSubmission {
                order: signed,
                owner: creds.api_key.clone(),
                order_type: "GTC".to_string(),
            });

        if let Some(builder) = &self.builder {
            let sig = sign_builder_headers(builder, &url);
            request = request
                .header("BUILDER_API_KEY", &builder.api_key)
                .header("BUILDER_SIGNATURE", sig);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        interpret_order_response(status, &body)
    }
}

fn interpret_order_response(status: reqwest::StatusCode, body: &str) -> Result<PlaceOrderOutcome> {
    if body.trim().is_empty() {
        return Ok(PlaceOrderOutcome::Failed("empty response body".to_string()));
    }
    if is_market_closed_indicator(body) {
        return Ok(PlaceOrderOutcome::MarketClosed);
    }
    if status.as_u16() >= 400 {
        return Ok(PlaceOrderOutcome::Failed(format!("status {}: {}", status, body)));
    }

    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Ok(PlaceOrderOutcome::Failed(format!("unparseable response: {}", body))),
    };

    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        if is_market_closed_indicator(err) {
            return Ok(PlaceOrderOutcome::MarketClosed);
        }
        return Ok(PlaceOrderOutcome::Failed(err.to_string()));
    }

    let order_id = parsed
        .get("orderID")
        .or_else(|| parsed.get("orderId"))
        .or_else(|| parsed.get("id"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());

    match order_id {
        Some(id) => Ok(PlaceOrderOutcome::Executed { order_id: id.to_string() }),
        None => Ok(PlaceOrderOutcome::Failed("no order id in response".to_string())),
    }
}

fn is_market_closed_indicator(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("market is closed")
        || lower.contains("market not found")
        || lower.contains("orderbook does not exist")
        || lower.contains("market is not active")
}

fn sign_builder_headers(builder: &BuilderCredentials, payload: &str) -> String {
    use hmac::{Hmac, KeyInit, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(builder.api_secret.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

#[derive(Serialize)]
struct OrderSubmission {
    order: crate::signing::order_types::SignedOrder,
    owner: String,
    #[serde(rename = "orderType")]
    order_type: String,
}

#[derive(Deserialize)]
struct DerivedCredsResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
    secret: String,
    passphrase: String,
}

#[derive(Deserialize)]
struct MinOrderSizeResponse {
    #[serde(rename = "minOrderSize")]
    min_order_size: Decimal,
}

#[derive(Deserialize)]
struct RawMarket {
    #[serde(rename = "conditionId")]
    condition_id: String,
    question: String,
    tokens: Vec<RawToken>,
    #[serde(default, rename = "tickSize")]
    tick_size: Decimal,
    #[serde(default, rename = "negRisk")]
    neg_risk: bool,
    #[serde(default)]
    closed: bool,
}

#[derive(Deserialize)]
struct RawToken {
    #[serde(rename = "tokenId")]
    token_id: String,
    outcome: String,
    #[serde(default, rename = "minOrderSize")]
    min_order_size: Decimal,
}

impl From<RawMarket> for Market {
    fn from(m: RawMarket) -> Self {
        Market {
            condition_id: m.condition_id,
            question: m.question,
            outcomes: m
                .tokens
                .into_iter()
                .map(|t| Outcome {
                    name: t.outcome,
                    token_id: t.token_id,
                    min_order_size: if t.min_order_size.is_zero() {
                        Decimal::new(5, 0)
                    } else {
                        t.min_order_size
                    },
                })
                .collect(),
            tick_size: if m.tick_size.is_zero() { Decimal::new(1, 2) } else { m.tick_size },
            neg_risk: m.neg_risk,
            resolved: m.closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_closed_indicator_detection() {
        assert!(is_market_closed_indicator("Market is closed for trading"));
        assert!(is_market_closed_indicator("ORDERBOOK DOES NOT EXIST"));
        assert!(!is_market_closed_indicator("insufficient balance"));
    }

    #[test]
    fn test_interpret_order_response_extracts_order_id_variants() {
        for key in ["orderID", "orderId", "id"] {
            let body = format!(r#"{{"{}":"abc123"}}"#, key);
            let outcome = interpret_order_response(reqwest::StatusCode::OK, &body).unwrap();
            assert!(matches!(outcome, PlaceOrderOutcome::Executed { order_id } if order_id == "abc123"));
        }
    }

    #[test]
    fn test_interpret_order_response_empty_body_fails() {
        let outcome = interpret_order_response(reqwest::StatusCode::OK, "").unwrap();
        assert!(matches!(outcome, PlaceOrderOutcome::Failed(_)));
    }

    #[test]
    fn test_interpret_order_response_market_closed_error_field() {
        let body = r#"{"error":"market is closed"}"#;
        let outcome = interpret_order_response(reqwest::StatusCode::BAD_REQUEST, body).unwrap();
        assert!(matches!(outcome, PlaceOrderOutcome::MarketClosed));
    }

    #[test]
    fn test_interpret_order_response_missing_id_fails() {
        let body = r#"{"status":"ok"}"#;
        let outcome = interpret_order_response(reqwest::StatusCode::OK, body).unwrap();
        assert!(matches!(outcome, PlaceOrderOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_neg_risk_signer_signs_the_same_order_differently() {
        let pk = alloy_signer_local::PrivateKeySigner::random();
        let signer = OrderSigner::new(pk);
        let client = ClobApiClient::new("http://unused.invalid".to_string(), signer, None);

        assert_eq!(client.signer.address(), client.neg_risk_signer.address());

        let order = client
            .signer
            .order_builder()
            .token_id(alloy_primitives::U256::from(1u64))
            .price(rust_decimal::Decimal::new(50, 2))
            .size(rust_decimal::Decimal::from(10u64))
            .expires_in(60)
            .build()
            .unwrap();

        let standard_signed = client.signer.sign_order(&order).await.unwrap();
        let neg_risk_signed = client.neg_risk_signer.sign_order(&order).await.unwrap();

        assert_ne!(
            standard_signed.signature, neg_risk_signed.signature,
            "same order must sign differently under the neg-risk domain"
        );
    }
}
