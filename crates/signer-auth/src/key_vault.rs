//! Decryption for the operator's signing key when it's supplied
//! encrypted-at-rest (`SIGNING_KEY_ENCRYPTED` + `SIGNING_KEY_PASSPHRASE`)
//! instead of as a plaintext environment variable.
//!
//! The engine holds exactly one credential, so this is a single-blob
//! encrypt/decrypt pair rather than a multi-wallet, multi-backend vault:
//! AES-256-GCM with a SHA-256-derived key.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use sha2::{Digest, Sha256};

/// AES-GCM nonce size (96 bits / 12 bytes as recommended).
const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 32;

/// The operator's signing key, encrypted under a passphrase.
///
/// Serializes to/from a single base64 blob (`salt || nonce || ciphertext`)
/// suitable for the `SIGNING_KEY_ENCRYPTED` environment variable.
pub struct EncryptedSigningKey {
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl EncryptedSigningKey {
    /// Encrypt `signing_key` under `passphrase`. Used by operators ahead of
    /// time to produce the `SIGNING_KEY_ENCRYPTED` value; the running
    /// engine only ever calls `decrypt`.
    pub fn encrypt(signing_key: &str, passphrase: &[u8]) -> Result<Self> {
        use rand::Rng;

        let mut salt = [0u8; SALT_SIZE];
        rand::rng().fill(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill(&mut nonce_bytes);

        let cipher = derive_cipher(passphrase, &salt)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), signing_key.as_bytes())
            .map_err(|e| anyhow!("signing key encryption failed: {e}"))?;

        Ok(Self { salt, nonce: nonce_bytes, ciphertext })
    }

    /// Decrypt back to the plaintext signing key.
    pub fn decrypt(&self, passphrase: &[u8]) -> Result<String> {
        let cipher = derive_cipher(passphrase, &self.salt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| anyhow!("wrong passphrase or corrupted SIGNING_KEY_ENCRYPTED value"))?;

        String::from_utf8(plaintext).context("decrypted signing key was not valid utf-8")
    }

    pub fn to_base64(&self) -> String {
        let mut blob = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + self.ciphertext.len());
        blob.extend_from_slice(&self.salt);
        blob.extend_from_slice(&self.nonce);
        blob.extend_from_slice(&self.ciphertext);
        base64::engine::general_purpose::STANDARD.encode(blob)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let blob = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("SIGNING_KEY_ENCRYPTED is not valid base64")?;

        if blob.len() < SALT_SIZE + NONCE_SIZE {
            return Err(anyhow!("SIGNING_KEY_ENCRYPTED value is too short to contain salt and nonce"));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&blob[..SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&blob[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);
        let ciphertext = blob[SALT_SIZE + NONCE_SIZE..].to_vec();

        Ok(Self { salt, nonce, ciphertext })
    }
}

fn derive_cipher(passphrase: &[u8], salt: &[u8]) -> Result<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(passphrase);
    hasher.update(salt);
    let derived_key = hasher.finalize();
    Aes256Gcm::new_from_slice(&derived_key).map_err(|e| anyhow!("failed to initialize cipher: {e}"))
}
