//! Environment-sourced configuration, read once at startup.

use crate::{Error, Result};
use std::env;
use std::time::Duration;

/// Everything the engine needs to know before it can place a single order.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub credentials: CredentialConfig,
    pub venue: VenueUrls,
    pub storage: StorageConfig,
    pub poll_interval: Duration,
    pub default_trade_size_usd: rust_decimal::Decimal,
    pub stop_loss: StopLossConfig,
}

/// How the signing key reaches the process: plain, or encrypted at rest.
#[derive(Debug, Clone)]
pub enum CredentialConfig {
    Plain { signing_key: String },
    Encrypted { ciphertext: String, passphrase: String },
}

#[derive(Debug, Clone)]
pub struct BuilderCredentials {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct VenueUrls {
    pub data_api: String,
    pub clob_api: String,
    pub ws_url: Option<String>,
    pub builder: Option<BuilderCredentials>,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres { url: String },
}

#[derive(Debug, Clone)]
pub struct StopLossConfig {
    pub enabled: bool,
    pub max_commitment_pct: rust_decimal::Decimal,
}

impl GlobalConfig {
    /// Load configuration from environment variables, loading a `.env`
    /// file first if one is present. Fatal on any missing required value —
    /// the engine must not start half-configured.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let credentials = match (
            env::var("SIGNING_KEY").ok(),
            env::var("SIGNING_KEY_ENCRYPTED").ok(),
            env::var("SIGNING_KEY_PASSPHRASE").ok(),
        ) {
            (Some(key), _, _) => CredentialConfig::Plain { signing_key: key },
            (None, Some(ciphertext), Some(passphrase)) => {
                CredentialConfig::Encrypted { ciphertext, passphrase }
            }
            _ => {
                return Err(Error::Fatal(
                    "no signing key configured: set SIGNING_KEY or SIGNING_KEY_ENCRYPTED + SIGNING_KEY_PASSPHRASE"
                        .to_string(),
                ))
            }
        };

        let builder = match (env::var("BUILDER_API_KEY").ok(), env::var("BUILDER_API_SECRET").ok()) {
            (Some(api_key), Some(api_secret)) => Some(BuilderCredentials { api_key, api_secret }),
            _ => None,
        };

        let venue = VenueUrls {
            data_api: env::var("VENUE_DATA_API_URL")
                .map_err(|_| Error::Fatal("VENUE_DATA_API_URL not set".to_string()))?,
            clob_api: env::var("VENUE_CLOB_API_URL")
                .map_err(|_| Error::Fatal("VENUE_CLOB_API_URL not set".to_string()))?,
            ws_url: env::var("VENUE_WS_URL").ok(),
            builder,
        };

        let storage = match env::var("DATABASE_URL").ok() {
            Some(url) => StorageConfig::Postgres { url },
            None => StorageConfig::InMemory,
        };

        let poll_interval_ms: u64 = env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);

        let default_trade_size_usd = env::var("DEFAULT_TRADE_SIZE_USD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| rust_decimal::Decimal::new(25, 0));

        let stop_loss_enabled = env::var("STOP_LOSS_ENABLED")
            .ok()
            .map(|s| s == "true" || s == "1")
            .unwrap_or(true);

        let max_commitment_pct = env::var("STOP_LOSS_MAX_COMMITMENT_PCT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| rust_decimal::Decimal::new(80, 0));

        Ok(Self {
            credentials,
            venue,
            storage,
            poll_interval: Duration::from_millis(poll_interval_ms),
            default_trade_size_usd,
            stop_loss: StopLossConfig {
                enabled: stop_loss_enabled,
                max_commitment_pct,
            },
        })
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            credentials: CredentialConfig::Plain {
                signing_key: "0x0101010101010101010101010101010101010101010101010101010101010101"
                    .to_string(),
            },
            venue: VenueUrls {
                data_api: "https://data-api.test".to_string(),
                clob_api: "https://clob.test".to_string(),
                ws_url: None,
                builder: None,
            },
            storage: StorageConfig::InMemory,
            poll_interval: Duration::from_millis(1_000),
            default_trade_size_usd: rust_decimal::Decimal::new(25, 0),
            stop_loss: StopLossConfig {
                enabled: true,
                max_commitment_pct: rust_decimal::Decimal::new(80, 0),
            },
        }
    }
}
