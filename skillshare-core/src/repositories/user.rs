//! Repository trait for user accounts and their lockout counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    user::{NewUserAccount, UserAccount, UserId},
};

/// Storage for [`UserAccount`] records.
///
/// All email arguments are already normalized. The counter methods are the
/// concurrency boundary of the lockout policy: implementations must make each
/// of them a single atomic write so that parallel login attempts against one
/// account neither lose increments nor apply two locks.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Insert a new account with zeroed counters.
    ///
    /// # Errors
    ///
    /// `AuthError::UserAlreadyExists` when the email is taken.
    async fn create(&self, user: &NewUserAccount, now: DateTime<Utc>) -> Result<UserAccount, Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, Error>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, Error>;

    /// Replace the password hash without touching lockout state.
    async fn set_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Replace the password hash and clear `login_attempts` and `lock_until`.
    /// `total_failed_attempts` is kept.
    async fn reset_password(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Atomically count one failed attempt.
    ///
    /// Applies only while the account is not locked at `now`. If the stored
    /// lock has expired, `login_attempts` restarts at 1 and the lock is
    /// cleared; otherwise it is incremented. `total_failed_attempts` always
    /// increments and `last_login_attempt` becomes `now`.
    ///
    /// # Returns
    ///
    /// The row after the increment, or `None` when the account does not exist
    /// or is currently locked.
    async fn record_failed_attempt(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error>;

    /// Compare-and-set the lock.
    ///
    /// Writes `lock_until = until` only when the stored lock is absent or has
    /// expired at `now`.
    ///
    /// # Returns
    ///
    /// `true` if this call applied the lock.
    async fn lock_if_unlocked(
        &self,
        email: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Clear `login_attempts` and `lock_until` after a verified password,
    /// provided the account is not locked at `now`.
    ///
    /// # Returns
    ///
    /// `false` when a concurrent attempt locked the account first.
    async fn record_successful_login(&self, email: &str, now: DateTime<Utc>) -> Result<bool, Error>;

    /// Admin unlock: clear `login_attempts` and `lock_until`, set
    /// `last_login_attempt = now`.
    ///
    /// # Returns
    ///
    /// The updated row, or `None` for an unknown email.
    async fn unlock(&self, email: &str, now: DateTime<Utc>) -> Result<Option<UserAccount>, Error>;

    /// Admin reset: clear both counters and the lock.
    ///
    /// # Returns
    ///
    /// The updated row, or `None` for an unknown email.
    async fn reset_failed_attempts(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error>;
}
