//! EIP-712 order signing and L1 auth-message signing for the venue's CLOB.
//!
//! An `OrderSigner` pairs one private key with one signing domain. Standard
//! markets and neg-risk markets use different verifying contracts, so
//! `ClobApiClient` keeps two signers over the same key (see `to_neg_risk`)
//! and picks between them per order.

use alloy_primitives::{Address, B256, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;
use anyhow::{Context, Result};

use super::domain::{ClobAuthDomain, Eip712Domain};
use super::order_types::{OrderBuilder, OrderData, SignedOrder};

#[derive(Clone)]
pub struct OrderSigner {
    signer: PrivateKeySigner,
    domain: Eip712Domain,
}

impl OrderSigner {
    /// Create a signer against the standard CTF Exchange domain.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer, domain: Eip712Domain::ctf_exchange() }
    }

    /// Derive the neg-risk counterpart of this signer: same key, the
    /// Neg Risk CTF Exchange domain instead.
    pub fn to_neg_risk(&self) -> Self {
        Self { signer: self.signer.clone(), domain: Eip712Domain::neg_risk_ctf_exchange() }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// An order builder pre-populated with this signer's maker address.
    pub fn order_builder(&self) -> OrderBuilder {
        OrderBuilder::new().maker(self.address())
    }

    pub async fn sign_order(&self, order: &OrderData) -> Result<SignedOrder> {
        let signature = self.sign_typed_data(order).await?;
        Ok(SignedOrder::from_order_data(order, signature))
    }

    async fn sign_typed_data(&self, order: &OrderData) -> Result<String> {
        let domain_separator = self.domain.separator();
        let struct_hash = order.struct_hash();
        let digest = compute_typed_data_hash(domain_separator, struct_hash);

        let signature = self.signer.sign_hash(&digest).await.context("failed to sign order")?;
        Ok(signature_to_hex(&signature))
    }

    /// Sign the L1 auth message used for deriving L2 API credentials.
    ///
    /// Matches the venue's `ClobAuth(address address, string timestamp,
    /// uint256 nonce, string message)` EIP-712 struct.
    pub async fn sign_clob_auth_message(&self, timestamp: u64, nonce: u64) -> Result<String> {
        let auth_domain = ClobAuthDomain::polygon();
        let domain_separator = auth_domain.separator();
        let struct_hash = clob_auth_struct_hash(self.address(), timestamp, nonce);
        let digest = compute_typed_data_hash(domain_separator, struct_hash);

        let signature =
            self.signer.sign_hash(&digest).await.context("failed to sign CLOB auth message")?;
        Ok(signature_to_hex(&signature))
    }
}

/// alloy-primitives' `as_bytes()` already returns v as 27/28, so no
/// conversion is needed here.
fn signature_to_hex(sig: &alloy_primitives::Signature) -> String {
    format!("0x{}", hex::encode(sig.as_bytes()))
}

fn compute_typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    // The u8 annotation matters: without it Rust infers [i32; 2] and
    // abi_encode_packed writes 4 bytes per element instead of 1.
    let prefix: [u8; 2] = [0x19, 0x01];
    let data = (prefix, domain_separator, struct_hash).abi_encode_packed();
    alloy_primitives::keccak256(&data)
}

fn clob_auth_struct_hash(address: Address, timestamp: u64, nonce: u64) -> B256 {
    const CLOB_AUTH_MSG: &str = "This message attests that I control the given wallet";

    let type_hash = alloy_primitives::keccak256(
        b"ClobAuth(address address,string timestamp,uint256 nonce,string message)",
    );
    let timestamp_hash = alloy_primitives::keccak256(timestamp.to_string().as_bytes());
    let message_hash = alloy_primitives::keccak256(CLOB_AUTH_MSG.as_bytes());
    let address_padded = B256::left_padding_from(address.as_slice());

    let encoded =
        (type_hash, address_padded, timestamp_hash, U256::from(nonce), message_hash).abi_encode_packed();

    alloy_primitives::keccak256(&encoded)
}

impl std::fmt::Debug for OrderSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSigner")
            .field("address", &format!("{:?}", self.address()))
            .field("domain", &self.domain.name)
            .finish()
    }
}
