//! HTTP/WebSocket clients for the venue: Data API reads, order-book
//! submission, and the optional push stream.

pub mod clob;
pub mod data;
pub mod push;
pub mod rate_limit;
pub mod retry;

pub use clob::{ApiCredentials, BuilderCredentials, ClobApiClient, PlaceOrderOutcome};
pub use data::{DataApiClient, RawPosition, RawTrade};
pub use push::{PushStream, StreamState};

use crate::config::{CredentialConfig, GlobalConfig};
use crate::signing::OrderSigner;
use crate::{Error, Result};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;

/// Bundles the Data API and order-book clients behind the single signing
/// key the engine holds. Constructed once at startup; `Fatal` on any
/// misconfiguration, per the error taxonomy's startup-failure kind.
pub struct VenueClient {
    pub data: DataApiClient,
    pub clob: ClobApiClient,
    pub signer_address: alloy_primitives::Address,
}

impl VenueClient {
    pub async fn from_config(config: &GlobalConfig) -> Result<Self> {
        let private_key = match &config.credentials {
            CredentialConfig::Plain { signing_key } => signing_key.clone(),
            CredentialConfig::Encrypted { .. } => {
                return Err(Error::Fatal(
                    "encrypted signing key must be decrypted by signer-auth before VenueClient::from_config"
                        .to_string(),
                ))
            }
        };

        let pk_signer = PrivateKeySigner::from_str(&private_key)
            .map_err(|e| Error::Fatal(format!("invalid signing key: {}", e)))?;
        let signer_address = pk_signer.address();
        let order_signer = OrderSigner::new(pk_signer);

        let builder = config.venue.builder.as_ref().map(|b| BuilderCredentials {
            api_key: b.api_key.clone(),
            api_secret: b.api_secret.clone(),
        });

        let clob = ClobApiClient::new(config.venue.clob_api.clone(), order_signer, builder);
        clob.derive_api_credentials()
            .await
            .map_err(|e| Error::Fatal(format!("failed to derive API credentials: {}", e)))?;

        let data = DataApiClient::new(config.venue.data_api.clone());

        Ok(Self { data, clob, signer_address })
    }
}
