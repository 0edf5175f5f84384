//! Password reset tokens.
//!
//! Only the SHA-256 digest of a token is stored; see [`crate::crypto`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub fn default_reset_token_ttl() -> Duration {
    Duration::minutes(RESET_TOKEN_TTL_MINUTES)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}
