use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    Error, crypto,
    error::AuthError,
    events::{Event, UnlockReason},
    repositories::{ResetTokenRepository, UserRepository},
    services::LockoutService,
    token::default_reset_token_ttl,
    user::{UserAccount, normalize_email},
    validation::validate_password,
};

/// Delivers a freshly issued reset token to its owner.
#[async_trait]
pub trait ResetTokenSender: Send + Sync + 'static {
    async fn send(&self, user: &UserAccount, token: &str) -> Result<(), Error>;
}

/// Logs the reset link instead of sending it. For local development only.
pub struct LogResetTokenSender {
    base_url: String,
}

impl LogResetTokenSender {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResetTokenSender for LogResetTokenSender {
    async fn send(&self, user: &UserAccount, token: &str) -> Result<(), Error> {
        tracing::debug!(
            user_id = %user.id,
            reset_url = %format!("{}?token={token}", self.base_url),
            "Password reset link issued"
        );
        Ok(())
    }
}

/// Forgot-password flow. Completing a reset also lifts any lockout.
pub struct PasswordResetService<U: UserRepository, T: ResetTokenRepository> {
    users: Arc<U>,
    tokens: Arc<T>,
    lockout: Arc<LockoutService<U>>,
    token_ttl: Duration,
}

impl<U: UserRepository, T: ResetTokenRepository> PasswordResetService<U, T> {
    pub fn new(users: Arc<U>, tokens: Arc<T>, lockout: Arc<LockoutService<U>>) -> Self {
        Self {
            users,
            tokens,
            lockout,
            token_ttl: default_reset_token_ttl(),
        }
    }

    pub fn with_token_ttl(mut self, token_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    /// Issue a reset token for `email`.
    ///
    /// Returns `None` for unknown emails; callers must answer both cases the
    /// same way. The plaintext token is only available here.
    pub async fn request_reset(&self, email: &str) -> Result<Option<(UserAccount, String)>, Error> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::debug!(email = %email, "Password reset requested for unknown email");
            return Ok(None);
        };

        let now = self.lockout.clock().now();
        let issued = crypto::generate_reset_token();
        self.tokens
            .create(&issued.hash, &user.id, now + self.token_ttl, now)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset token issued");
        Ok(Some((user, issued.plaintext)))
    }

    /// Check a token without consuming it.
    pub async fn verify_token(&self, token: &str) -> Result<bool, Error> {
        let now = self.lockout.clock().now();
        Ok(self
            .tokens
            .find_valid(&crypto::hash_token(token), now)
            .await?
            .is_some())
    }

    /// Consume `token` and set a new password.
    ///
    /// Clears `login_attempts` and `lock_until`; the lifetime failure count is kept.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<UserAccount, Error> {
        validate_password(new_password)?;

        let now = self.lockout.clock().now();
        let consumed = self
            .tokens
            .consume(&crypto::hash_token(token), now)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = crypto::hash_password(new_password);
        self.users
            .reset_password(&consumed.user_id, &password_hash, now)
            .await?;

        let user = self
            .users
            .find_by_id(&consumed.user_id)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        self.lockout
            .events()
            .publish(Event::AccountUnlocked {
                email: user.email.clone(),
                reason: UnlockReason::PasswordReset,
                timestamp: now,
            })
            .await;

        Ok(user)
    }

    /// Remove expired tokens. Returns the number deleted.
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, Error> {
        self.tokens.delete_expired(self.lockout.clock().now()).await
    }
}
