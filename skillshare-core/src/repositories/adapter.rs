use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    repositories::{RepositoryProvider, ResetTokenRepository, UserRepository},
    token::PasswordResetToken,
    user::{NewUserAccount, UserAccount, UserId},
};

/// Adapter that wraps a RepositoryProvider and implements [`UserRepository`]
pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, user: &NewUserAccount, now: DateTime<Utc>) -> Result<UserAccount, Error> {
        self.provider.user().create(user, now).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn set_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.provider
            .user()
            .set_password_hash(id, password_hash, now)
            .await
    }

    async fn reset_password(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.provider
            .user()
            .reset_password(id, password_hash, now)
            .await
    }

    async fn record_failed_attempt(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error> {
        self.provider.user().record_failed_attempt(email, now).await
    }

    async fn lock_if_unlocked(
        &self,
        email: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.provider.user().lock_if_unlocked(email, until, now).await
    }

    async fn record_successful_login(&self, email: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        self.provider.user().record_successful_login(email, now).await
    }

    async fn unlock(&self, email: &str, now: DateTime<Utc>) -> Result<Option<UserAccount>, Error> {
        self.provider.user().unlock(email, now).await
    }

    async fn reset_failed_attempts(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error> {
        self.provider.user().reset_failed_attempts(email, now).await
    }
}

/// Adapter that wraps a RepositoryProvider and implements [`ResetTokenRepository`]
pub struct ResetTokenRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> ResetTokenRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> ResetTokenRepository for ResetTokenRepositoryAdapter<R> {
    async fn create(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetToken, Error> {
        self.provider
            .reset_token()
            .create(token_hash, user_id, expires_at, now)
            .await
    }

    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error> {
        self.provider.reset_token().find_valid(token_hash, now).await
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error> {
        self.provider.reset_token().consume(token_hash, now).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.reset_token().delete_expired(now).await
    }
}
