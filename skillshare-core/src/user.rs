//! User accounts
//!
//! [`UserAccount`] is the persisted record every authentication attempt reads and
//! mutates. Besides identity fields it carries the lockout counters:
//!
//! | Field                   | Type               | Description                                                   |
//! | ----------------------- | ------------------ | ------------------------------------------------------------- |
//! | `login_attempts`        | `u32`              | Consecutive failures since the last success or unlock.        |
//! | `total_failed_attempts` | `u32`              | Lifetime failures. Only an admin reset lowers it.             |
//! | `lock_until`            | `Option<DateTime>` | The account is locked while this lies in the future.          |
//! | `last_login_attempt`    | `Option<DateTime>` | Time of the most recent attempt, successful or not.           |
//!
//! Lockout transitions live in [`crate::lockout`]; this module only holds data.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::ValidationError,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// A unique, stable identifier for a specific user
/// This value should be treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for a user ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Emails are unique case-insensitively; every lookup and write goes through this.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: UserId,

    pub email: String,

    pub name: String,

    /// Absent for accounts created through a social provider.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    pub provider: Option<String>,

    pub provider_id: Option<String>,

    pub email_verified_at: Option<DateTime<Utc>>,

    pub login_attempts: u32,

    pub total_failed_attempts: u32,

    pub lock_until: Option<DateTime<Utc>>,

    pub last_login_attempt: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn builder() -> UserAccountBuilder {
        UserAccountBuilder::default()
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }
}

#[derive(Default)]
pub struct UserAccountBuilder {
    id: Option<UserId>,
    email: Option<String>,
    name: Option<String>,
    password_hash: Option<String>,
    provider: Option<String>,
    provider_id: Option<String>,
    email_verified_at: Option<DateTime<Utc>>,
    login_attempts: u32,
    total_failed_attempts: u32,
    lock_until: Option<DateTime<Utc>>,
    last_login_attempt: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl UserAccountBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn password_hash(mut self, password_hash: Option<String>) -> Self {
        self.password_hash = password_hash;
        self
    }

    pub fn provider(mut self, provider: Option<String>, provider_id: Option<String>) -> Self {
        self.provider = provider;
        self.provider_id = provider_id;
        self
    }

    pub fn email_verified_at(mut self, email_verified_at: Option<DateTime<Utc>>) -> Self {
        self.email_verified_at = email_verified_at;
        self
    }

    pub fn login_attempts(mut self, login_attempts: u32) -> Self {
        self.login_attempts = login_attempts;
        self
    }

    pub fn total_failed_attempts(mut self, total_failed_attempts: u32) -> Self {
        self.total_failed_attempts = total_failed_attempts;
        self
    }

    pub fn lock_until(mut self, lock_until: Option<DateTime<Utc>>) -> Self {
        self.lock_until = lock_until;
        self
    }

    pub fn last_login_attempt(mut self, last_login_attempt: Option<DateTime<Utc>>) -> Self {
        self.last_login_attempt = last_login_attempt;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn build(self) -> Result<UserAccount, Error> {
        let now = Utc::now();
        let email = self
            .email
            .ok_or(ValidationError::MissingField("Email is required".to_string()))?;

        Ok(UserAccount {
            id: self.id.unwrap_or_default(),
            email: normalize_email(&email),
            name: self.name.map(|n| n.trim().to_string()).unwrap_or_default(),
            password_hash: self.password_hash,
            provider: self.provider,
            provider_id: self.provider_id,
            email_verified_at: self.email_verified_at,
            login_attempts: self.login_attempts,
            total_failed_attempts: self.total_failed_attempts,
            lock_until: self.lock_until,
            last_login_attempt: self.last_login_attempt,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

/// Everything needed to insert an account. Counters always start at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserAccount {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
}

impl NewUserAccount {
    pub fn with_password(email: &str, name: &str, password_hash: String) -> Self {
        Self {
            id: UserId::new_random(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            password_hash: Some(password_hash),
            provider: None,
            provider_id: None,
        }
    }

    pub fn with_provider(email: &str, name: &str, provider: &str, provider_id: &str) -> Self {
        Self {
            id: UserId::new_random(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            password_hash: None,
            provider: Some(provider.to_string()),
            provider_id: Some(provider_id.to_string()),
        }
    }
}
