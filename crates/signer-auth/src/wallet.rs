//! Validates and addresses the operator's signing key before it reaches
//! `OrderSigner`.
//!
//! `main`'s `resolve_signing_key` builds a `TradingWallet` from the
//! resolved hex key (plain or just-decrypted) purely to fail fast on a
//! malformed key and to log the operator address before any network I/O —
//! `VenueClient::from_config` parses the key into its own `PrivateKeySigner`
//! independently, so this wallet is never handed off or reused for signing.

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::str::FromStr;

#[derive(Clone)]
pub struct TradingWallet {
    address: Address,
}

impl TradingWallet {
    /// Parse and validate a hex-encoded private key, optionally prefixed
    /// with "0x".
    ///
    /// # Errors
    ///
    /// Returns an error if the private key format is invalid.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");

        let signer = PrivateKeySigner::from_str(key_clean)
            .context("invalid private key format - expected 64 hex characters")?;

        Ok(Self { address: signer.address() })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn address_string(&self) -> String {
        format!("{}", self.address)
    }
}

impl std::fmt::Debug for TradingWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingWallet").field("address", &self.address_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_from_private_key_with_prefix() {
        let wallet = TradingWallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(wallet.address_string().to_lowercase(), TEST_ADDRESS.to_lowercase());
    }

    #[test]
    fn test_from_private_key_without_prefix() {
        let key_no_prefix = TEST_PRIVATE_KEY.trim_start_matches("0x");
        let wallet = TradingWallet::from_private_key(key_no_prefix).unwrap();
        assert_eq!(wallet.address_string().to_lowercase(), TEST_ADDRESS.to_lowercase());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(TradingWallet::from_private_key("not-a-valid-key").is_err());
    }

    #[test]
    fn test_short_private_key() {
        assert!(TradingWallet::from_private_key("0x1234").is_err());
    }

    #[test]
    fn test_debug_does_not_expose_key() {
        let wallet = TradingWallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let debug_str = format!("{:?}", wallet);

        assert!(debug_str.contains("TradingWallet"));
        assert!(debug_str.contains("address"));
        assert!(!debug_str.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
    }
}
