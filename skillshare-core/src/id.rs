//! Prefixed identifiers for persisted records.
//!
//! IDs look like `usr_<base64url>` and carry at least 96 bits of entropy.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

const ID_ENTROPY_BYTES: usize = 12;

/// Generate a prefixed ID such as `usr_Zm9vYmFyYmF6cXV4`.
///
/// # Panics
///
/// Panics if the OS random number generator is unavailable.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; ID_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Check that `id` is `{expected_prefix}_` followed by at least 96 bits of base64url data.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= ID_ENTROPY_BYTES,
        Err(_) => false,
    }
}
