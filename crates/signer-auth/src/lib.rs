//! Signing-key custody: the engine's one long-lived credential.
//!
//! `TradingWallet` validates the resolved hex key and derives its address
//! for startup logging; it does not hold a signer itself (`OrderSigner` is
//! built separately from the same key). `EncryptedSigningKey` decrypts that
//! key when it's supplied encrypted-at-rest instead of as a plaintext
//! environment variable.

pub mod key_vault;
pub mod wallet;

pub use key_vault::EncryptedSigningKey;
pub use wallet::TradingWallet;
