//! Password hashing and reset-token helpers.
//!
//! Passwords go through `password-auth` (Argon2id with a random salt).
//! Reset tokens carry 256 bits of entropy, so a plain SHA-256 digest is
//! enough for storage; only the digest is ever persisted and comparisons
//! run in constant time.

use std::sync::LazyLock;

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

const RESET_TOKEN_BYTES: usize = 32;

// Same parameters as stored hashes so a dummy check costs what a real one does.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| password_auth::generate_hash("skillshare-no-such-account"));

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    password_auth::generate_hash(password)
}

/// Check a password against a stored PHC hash.
///
/// A malformed stored hash is an error, a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CryptoError> {
    match password_auth::verify_password(password, stored_hash) {
        Ok(()) => Ok(true),
        Err(password_auth::VerifyError::PasswordInvalid) => Ok(false),
        Err(e) => Err(CryptoError::PasswordHash(e.to_string())),
    }
}

/// Run a full verification against a throwaway hash.
///
/// Login paths that reject without a stored hash call this so that unknown
/// accounts take as long as wrong passwords.
pub fn verify_dummy_password(password: &str) {
    let _ = password_auth::verify_password(password, &DUMMY_HASH);
}

/// A freshly minted reset token. `plaintext` is handed to the user once.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub hash: String,
}

/// Generate a URL-safe token and its storage digest.
///
/// # Panics
///
/// Panics if the OS random number generator is unavailable.
pub fn generate_reset_token() -> IssuedToken {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    let plaintext = BASE64_URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_token(&plaintext);
    IssuedToken { plaintext, hash }
}

/// Hex-encoded SHA-256 of `token`. Deterministic, so it doubles as the lookup key.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    let computed = hash_token(token);
    computed.len() == stored_hash.len()
        && bool::from(computed.as_bytes().ct_eq(stored_hash.as_bytes()))
}
