//! In-memory repositories for service tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    Error,
    error::AuthError,
    repositories::{ResetTokenRepository, UserRepository},
    token::PasswordResetToken,
    user::{NewUserAccount, UserAccount, UserId},
};

/// Keyed by email. Every method runs under one lock, which gives the same
/// atomicity the SQL statements provide.
#[derive(Default)]
pub(crate) struct MockUserRepository {
    users: Mutex<HashMap<String, UserAccount>>,
}

impl MockUserRepository {
    pub(crate) async fn insert(&self, account: UserAccount) {
        self.users
            .lock()
            .await
            .insert(account.email.clone(), account);
    }

    pub(crate) async fn get(&self, email: &str) -> Option<UserAccount> {
        self.users.lock().await.get(email).cloned()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: &NewUserAccount, now: DateTime<Utc>) -> Result<UserAccount, Error> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.email) {
            return Err(AuthError::UserAlreadyExists.into());
        }
        let account = UserAccount::builder()
            .id(user.id.clone())
            .email(user.email.clone())
            .name(user.name.clone())
            .password_hash(user.password_hash.clone())
            .provider(user.provider.clone(), user.provider_id.clone())
            .created_at(now)
            .updated_at(now)
            .build()?;
        users.insert(account.email.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, Error> {
        Ok(self.get(email).await)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, Error> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| &u.id == id)
            .cloned())
    }

    async fn set_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.values_mut().find(|u| &u.id == id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = now;
        }
        Ok(())
    }

    async fn reset_password(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.values_mut().find(|u| &u.id == id) {
            user.password_hash = Some(password_hash.to_string());
            user.login_attempts = 0;
            user.lock_until = None;
            user.updated_at = now;
        }
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error> {
        // Yield so concurrent callers interleave between load and write.
        tokio::task::yield_now().await;
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(email) else {
            return Ok(None);
        };
        if user.is_locked_at(now) {
            return Ok(None);
        }
        user.login_attempts = if user.lock_until.is_some() {
            1
        } else {
            user.login_attempts + 1
        };
        user.total_failed_attempts += 1;
        user.lock_until = None;
        user.last_login_attempt = Some(now);
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn lock_if_unlocked(
        &self,
        email: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        tokio::task::yield_now().await;
        let mut users = self.users.lock().await;
        match users.get_mut(email) {
            Some(user) if !user.is_locked_at(now) => {
                user.lock_until = Some(until);
                user.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_successful_login(&self, email: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut users = self.users.lock().await;
        match users.get_mut(email) {
            Some(user) if !user.is_locked_at(now) => {
                user.login_attempts = 0;
                user.lock_until = None;
                user.last_login_attempt = Some(now);
                user.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlock(&self, email: &str, now: DateTime<Utc>) -> Result<Option<UserAccount>, Error> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(email).map(|user| {
            *user = crate::lockout::unlock_account(user, now);
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn reset_failed_attempts(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(email).map(|user| {
            *user = crate::lockout::reset_failed_attempts(user);
            user.updated_at = now;
            user.clone()
        }))
    }
}

#[derive(Default)]
pub(crate) struct MockResetTokenRepository {
    tokens: Mutex<HashMap<String, PasswordResetToken>>,
}

#[async_trait]
impl ResetTokenRepository for MockResetTokenRepository {
    async fn create(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetToken, Error> {
        let mut tokens = self.tokens.lock().await;
        for token in tokens.values_mut() {
            if &token.user_id == user_id && token.used_at.is_none() {
                token.used_at = Some(now);
            }
        }
        let token = PasswordResetToken {
            token_hash: token_hash.to_string(),
            user_id: user_id.clone(),
            expires_at,
            used_at: None,
            created_at: now,
        };
        tokens.insert(token_hash.to_string(), token.clone());
        Ok(token)
    }

    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error> {
        Ok(self
            .tokens
            .lock()
            .await
            .get(token_hash)
            .filter(|t| t.is_usable_at(now))
            .cloned())
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get_mut(token_hash) {
            Some(token) if token.is_usable_at(now) => {
                token.used_at = Some(now);
                Ok(Some(token.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}
