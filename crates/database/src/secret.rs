//! Opaque secrets for session tokens and API keys.
//!
//! Only the SHA-256 digest of a secret is stored; the plaintext is handed to
//! the caller once and never persisted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a generated secret.
const SECRET_BYTES: usize = 32;

/// Number of leading characters kept for display.
pub const PREFIX_LEN: usize = 8;

/// Generate a URL-safe random secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a secret for storage lookup.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// The display prefix of a secret.
pub fn secret_prefix(secret: &str) -> String {
    secret.chars().take(PREFIX_LEN).collect()
}
