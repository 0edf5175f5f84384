//! Lockout service: the policy engine bound to storage.
//!
//! [`crate::lockout::evaluate_attempt`] decides what should happen to an
//! account. This service makes it happen against a [`UserRepository`] in a way
//! that stays correct when several attempts for the same account run at once:
//!
//! 1. A failure is counted with a single atomic increment.
//! 2. The lock decision is recomputed from the row the increment returned.
//! 3. The lock is written with a compare-and-set, so only one caller applies it.
//!
//! # Example
//!
//! ```rust,ignore
//! use skillshare_core::{lockout::LockoutConfig, services::LockoutService};
//!
//! let service = LockoutService::new(repository, LockoutConfig::default());
//! let outcome = service.record_attempt("user@example.com", false, Some("10.0.0.1")).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    clock::{Clock, SystemClock},
    error::AuthError,
    events::{Event, EventBus, UnlockReason},
    lockout::{
        AccountUpdate, AttemptOutcome, LockoutConfig, LockoutInfo, LockoutPolicySummary,
        Rejection, evaluate_attempt, lock_after_failure, lockout_info, remaining_minutes,
    },
    repositories::UserRepository,
    user::{UserAccount, normalize_email},
};

/// Admin view of an account's lockout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLockoutStatus {
    pub email: String,
    pub login_attempts: u32,
    pub total_failed_attempts: u32,
    pub last_login_attempt: Option<DateTime<Utc>>,
    pub lockout_info: LockoutInfo,
    pub lockout_config: LockoutPolicySummary,
}

/// Outcome of an attempt together with the account as last seen in storage.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub outcome: AttemptOutcome,
    pub account: UserAccount,
}

/// Applies the lockout policy to stored accounts.
///
/// Cheap to share behind an `Arc`; all state lives in the repository.
pub struct LockoutService<R: UserRepository> {
    repository: Arc<R>,
    config: LockoutConfig,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl<R: UserRepository> LockoutService<R> {
    pub fn new(repository: Arc<R>, config: LockoutConfig) -> Self {
        Self {
            repository,
            config,
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Record an authentication attempt for `email`.
    ///
    /// # Arguments
    ///
    /// * `email` - The address that was attempted
    /// * `password_valid` - Result of the password check
    /// * `ip_address` - Client address, for the audit events
    ///
    /// # Errors
    ///
    /// `AuthError::UserNotFound` for an unknown email.
    pub async fn record_attempt(
        &self,
        email: &str,
        password_valid: bool,
        ip_address: Option<&str>,
    ) -> Result<AttemptOutcome, Error> {
        let email = normalize_email(email);
        let account = self
            .repository
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let now = self.clock.now();
        Ok(self.apply(&account, password_valid, ip_address, now).await?.outcome)
    }

    /// The lock outcome for `account` at `now`, if it is locked.
    pub fn check_locked(&self, account: &UserAccount, now: DateTime<Utc>) -> Option<AttemptOutcome> {
        let lock_until = account.lock_until.filter(|until| *until > now)?;
        Some(AttemptOutcome::Locked {
            remaining_minutes: remaining_minutes(lock_until, now),
            reason: self.config.lock_reason(account.total_failed_attempts),
        })
    }

    /// Evaluate an attempt against an already loaded account and persist the result.
    pub async fn apply(
        &self,
        account: &UserAccount,
        password_valid: bool,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error> {
        let evaluation = evaluate_attempt(&self.config, account, password_valid, now);

        match evaluation.update {
            AccountUpdate::None => {
                tracing::debug!(email = %account.email, "Attempt on locked account");
                Ok(AttemptRecord {
                    outcome: evaluation.outcome,
                    account: evaluation.account,
                })
            }
            AccountUpdate::Success => {
                if !self
                    .repository
                    .record_successful_login(&account.email, now)
                    .await?
                {
                    return self.current_state(&account.email, now).await;
                }

                self.events
                    .publish(Event::LoginSucceeded {
                        email: account.email.clone(),
                        ip_address: ip_address.map(str::to_string),
                        timestamp: now,
                    })
                    .await;

                Ok(AttemptRecord {
                    outcome: AttemptOutcome::Accepted,
                    account: evaluation.account,
                })
            }
            AccountUpdate::Failure { .. } => self.record_failure(&account.email, ip_address, now).await,
        }
    }

    async fn record_failure(
        &self,
        email: &str,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error> {
        let Some(mut updated) = self.repository.record_failed_attempt(email, now).await? else {
            // Locked by a concurrent attempt since we loaded it.
            return self.current_state(email, now).await;
        };

        let Some((until, reason)) = lock_after_failure(&self.config, &updated, now) else {
            self.events
                .publish(Event::LoginFailed {
                    email: email.to_string(),
                    failed_attempts: updated.login_attempts,
                    total_failed_attempts: updated.total_failed_attempts,
                    ip_address: ip_address.map(str::to_string),
                    timestamp: now,
                })
                .await;

            return Ok(AttemptRecord {
                outcome: AttemptOutcome::Rejected(Rejection::InvalidCredentials),
                account: updated,
            });
        };

        if !self.repository.lock_if_unlocked(email, until, now).await? {
            tracing::debug!(email = %email, "Lock already applied by a concurrent attempt");
            return self.current_state(email, now).await;
        }

        updated.lock_until = Some(until);
        self.events
            .publish(Event::AccountLocked {
                email: email.to_string(),
                failed_attempts: updated.login_attempts,
                total_failed_attempts: updated.total_failed_attempts,
                locked_until: until,
                reason,
                ip_address: ip_address.map(str::to_string),
                timestamp: now,
            })
            .await;

        Ok(AttemptRecord {
            outcome: AttemptOutcome::Rejected(Rejection::JustLocked {
                reason,
                remaining_minutes: remaining_minutes(until, now),
            }),
            account: updated,
        })
    }

    /// Re-read after losing a race. A locked row reports `Locked`, anything
    /// else is a plain rejection.
    async fn current_state(&self, email: &str, now: DateTime<Utc>) -> Result<AttemptRecord, Error> {
        let account = self
            .repository
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let outcome = self
            .check_locked(&account, now)
            .unwrap_or(AttemptOutcome::Rejected(Rejection::InvalidCredentials));

        Ok(AttemptRecord { outcome, account })
    }

    /// Counters, lock state and policy for one account.
    pub async fn status(&self, email: &str) -> Result<AccountLockoutStatus, Error> {
        let email = normalize_email(email);
        let account = self
            .repository
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let now = self.clock.now();
        Ok(AccountLockoutStatus {
            lockout_info: lockout_info(&self.config, &account, now),
            lockout_config: self.config.summary(),
            email: account.email,
            login_attempts: account.login_attempts,
            total_failed_attempts: account.total_failed_attempts,
            last_login_attempt: account.last_login_attempt,
        })
    }

    /// Admin unlock. Idempotent; the lifetime counter is kept.
    pub async fn unlock(&self, email: &str) -> Result<UserAccount, Error> {
        let email = normalize_email(email);
        let now = self.clock.now();
        let account = self
            .repository
            .unlock(&email, now)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.events
            .publish(Event::AccountUnlocked {
                email: account.email.clone(),
                reason: UnlockReason::AdminAction,
                timestamp: now,
            })
            .await;

        Ok(account)
    }

    /// Admin reset of both counters and the lock.
    pub async fn reset_failed_attempts(&self, email: &str) -> Result<UserAccount, Error> {
        let email = normalize_email(email);
        let now = self.clock.now();
        let account = self
            .repository
            .reset_failed_attempts(&email, now)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.events
            .publish(Event::FailedAttemptsReset {
                email: account.email.clone(),
                timestamp: now,
            })
            .await;

        Ok(account)
    }
}
