//! EIP-712 signing for orders and L1 auth messages sent to the venue's CLOB.
//!
//! # Architecture
//!
//! ```text
//! GlobalConfig.credentials (plain or signer-auth-decrypted)
//!       │
//!       ▼
//! OrderSigner ─── signs ──► SignedOrder ──► ClobApiClient ──► venue CLOB
//!       │
//!       └── L1 auth (sign_clob_auth_message) ──► derive_api_credentials
//! ```
//!
//! `ClobApiClient` keeps one `OrderSigner` per domain — standard and
//! neg-risk — over the same key, since the two market kinds settle through
//! different contracts (`OrderSigner::to_neg_risk`).
//!
//! # Example
//!
//! ```ignore
//! use venue_core::signing::{OrderSigner, OrderSide};
//! use alloy_signer_local::PrivateKeySigner;
//! use rust_decimal::Decimal;
//!
//! let private_key = PrivateKeySigner::from_str("0x...")?;
//! let signer = OrderSigner::new(private_key);
//!
//! let order = signer
//!     .order_builder()
//!     .token_id(U256::from(12345))
//!     .side(OrderSide::Buy)
//!     .price(Decimal::new(50, 2))  // 0.50
//!     .size(Decimal::from(100))    // 100 USDC
//!     .expires_in(3600)            // 1 hour
//!     .build()
//!     .unwrap();
//!
//! let signed_order = signer.sign_order(&order).await?;
//! ```

pub mod domain;
pub mod order_types;
pub mod signer;

pub use domain::{
    Eip712Domain, OrderSide, SignatureType,
    CTF_EXCHANGE_ADDRESS, NEG_RISK_ADAPTER_ADDRESS, NEG_RISK_CTF_EXCHANGE_ADDRESS,
    POLYGON_AMOY_CHAIN_ID, POLYGON_CHAIN_ID, USDC_ADDRESS,
};

pub use order_types::{OrderBuilder, OrderData, SignedOrder};

pub use signer::OrderSigner;
