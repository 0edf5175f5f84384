use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, token::PasswordResetToken, user::UserId};

/// Storage for hashed password reset tokens.
#[async_trait]
pub trait ResetTokenRepository: Send + Sync + 'static {
    /// Store a token digest. A user has at most one live token, so any
    /// previous unused token for `user_id` is invalidated.
    async fn create(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetToken, Error>;

    /// Look up a token that is unused and unexpired at `now` without consuming it.
    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error>;

    /// Atomically mark a valid token as used.
    ///
    /// # Returns
    ///
    /// The consumed token, or `None` if it was unknown, expired or already used.
    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error>;

    /// Delete tokens with `expires_at <= now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
