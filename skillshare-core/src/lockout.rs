//! Account lockout policy engine.
//!
//! Pure state transitions over a [`UserAccount`]. Given the stored record, the
//! result of the password check and the current time, [`evaluate_attempt`]
//! decides whether the caller may proceed and what the record becomes next.
//! Nothing here performs I/O or reads the system clock; persistence is driven
//! by the declarative [`AccountUpdate`] returned alongside the new state.
//!
//! # Policy
//!
//! - `max_login_attempts` consecutive failures lock the account.
//! - The lock lasts `lockout_duration`, or `extended_lockout_duration` once the
//!   lifetime failure count reaches `escalation_attempts`.
//! - An expired lock is cleared lazily on the next attempt. A failure after
//!   expiry restarts the consecutive counter at 1.
//! - Locked attempts never touch the counters.
//!
//! # Example
//!
//! ```rust,ignore
//! use skillshare_core::lockout::{AttemptOutcome, LockoutConfig, evaluate_attempt};
//!
//! let evaluation = evaluate_attempt(&LockoutConfig::default(), &account, false, now);
//! if let AttemptOutcome::Locked { remaining_minutes, reason } = evaluation.outcome {
//!     println!("{}", reason.message(remaining_minutes));
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, user::UserAccount};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Longest lock either duration may be configured with.
pub const MAX_LOCKOUT_DURATION: Duration = Duration::days(365);

/// Tunables for the lockout policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Consecutive failures before a lock is applied.
    pub max_login_attempts: u32,
    /// Lock length while the lifetime failure count is below `escalation_attempts`.
    pub lockout_duration: Duration,
    /// Lifetime failure count at or above which the extended duration applies.
    pub escalation_attempts: u32,
    /// Lock length once escalated.
    pub extended_lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lockout_duration: Duration::hours(2),
            escalation_attempts: 10,
            extended_lockout_duration: Duration::hours(24),
        }
    }
}

impl LockoutConfig {
    pub fn new(
        max_login_attempts: u32,
        lockout_duration: Duration,
        escalation_attempts: u32,
        extended_lockout_duration: Duration,
    ) -> Self {
        Self {
            max_login_attempts,
            lockout_duration,
            escalation_attempts,
            extended_lockout_duration,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_login_attempts == 0 {
            return Err(ValidationError::InvalidField(
                "max_login_attempts must be at least 1".to_string(),
            ));
        }
        if self.escalation_attempts == 0 {
            return Err(ValidationError::InvalidField(
                "escalation_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "lockout_duration must be positive".to_string(),
            ));
        }
        if self.extended_lockout_duration > MAX_LOCKOUT_DURATION {
            return Err(ValidationError::InvalidField(
                "lockout durations must not exceed 365 days".to_string(),
            ));
        }
        if self.extended_lockout_duration < self.lockout_duration {
            return Err(ValidationError::InvalidField(
                "extended_lockout_duration must not be shorter than lockout_duration".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_reason(&self, total_failed_attempts: u32) -> LockReason {
        if total_failed_attempts >= self.escalation_attempts {
            LockReason::SuspiciousActivity
        } else {
            LockReason::Standard
        }
    }

    pub fn lock_duration(&self, total_failed_attempts: u32) -> Duration {
        match self.lock_reason(total_failed_attempts) {
            LockReason::SuspiciousActivity => self.extended_lockout_duration,
            LockReason::Standard => self.lockout_duration,
        }
    }

    pub fn summary(&self) -> LockoutPolicySummary {
        LockoutPolicySummary {
            max_attempts: self.max_login_attempts,
            lockout_duration: self.lockout_duration.num_minutes(),
            escalation_attempts: self.escalation_attempts,
            extended_lockout_duration: self.extended_lockout_duration.num_hours(),
        }
    }
}

/// The policy as reported to administrators. Durations are in minutes and hours respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutPolicySummary {
    pub max_attempts: u32,
    pub lockout_duration: i64,
    pub escalation_attempts: u32,
    pub extended_lockout_duration: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    Standard,
    SuspiciousActivity,
}

impl LockReason {
    /// User-facing lockout text.
    pub fn message(&self, remaining_minutes: i64) -> String {
        match self {
            LockReason::Standard => format!(
                "Account locked after multiple failed login attempts. Please try again in {remaining_minutes} minutes."
            ),
            LockReason::SuspiciousActivity => format!(
                "Account temporarily locked due to suspicious activity. Please try again in {remaining_minutes} minutes or contact support."
            ),
        }
    }
}

impl std::fmt::Display for LockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockReason::Standard => write!(f, "standard lockout"),
            LockReason::SuspiciousActivity => write!(f, "suspicious activity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidCredentials,
    /// This attempt crossed the threshold and applied a new lock.
    JustLocked {
        reason: LockReason,
        remaining_minutes: i64,
    },
}

/// Result of a single authentication attempt. Outcomes are data, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    Locked {
        remaining_minutes: i64,
        reason: LockReason,
    },
    Rejected(Rejection),
}

impl AttemptOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AttemptOutcome::Accepted)
    }

    pub fn just_locked(&self) -> bool {
        matches!(self, AttemptOutcome::Rejected(Rejection::JustLocked { .. }))
    }

    /// The lockout text and remaining minutes for locked outcomes.
    pub fn lockout(&self) -> Option<(String, i64)> {
        match *self {
            AttemptOutcome::Locked {
                remaining_minutes,
                reason,
            }
            | AttemptOutcome::Rejected(Rejection::JustLocked {
                reason,
                remaining_minutes,
            }) => Some((reason.message(remaining_minutes), remaining_minutes)),
            _ => None,
        }
    }
}

/// What the store has to do to reach the evaluated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUpdate {
    /// Attempt made while locked.
    None,
    /// Increment both counters. `restart` means a lock had expired and
    /// `login_attempts` starts over at 1.
    Failure { restart: bool },
    /// Clear `login_attempts` and `lock_until`.
    Success,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub account: UserAccount,
    pub outcome: AttemptOutcome,
    pub update: AccountUpdate,
}

/// `ceil((lock_until - now) / 1 minute)`, zero when the lock is not in the future.
pub fn remaining_minutes(lock_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (lock_until - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + MILLIS_PER_MINUTE - 1) / MILLIS_PER_MINUTE
}

/// Decide one authentication attempt.
pub fn evaluate_attempt(
    config: &LockoutConfig,
    account: &UserAccount,
    password_valid: bool,
    now: DateTime<Utc>,
) -> Evaluation {
    if let Some(lock_until) = account.lock_until.filter(|until| *until > now) {
        return Evaluation {
            account: account.clone(),
            outcome: AttemptOutcome::Locked {
                remaining_minutes: remaining_minutes(lock_until, now),
                reason: config.lock_reason(account.total_failed_attempts),
            },
            update: AccountUpdate::None,
        };
    }

    if password_valid {
        let mut next = account.clone();
        next.login_attempts = 0;
        next.lock_until = None;
        next.last_login_attempt = Some(now);
        return Evaluation {
            account: next,
            outcome: AttemptOutcome::Accepted,
            update: AccountUpdate::Success,
        };
    }

    // Any lock still present here has expired.
    let restart = account.lock_until.is_some();
    let mut next = account.clone();
    next.login_attempts = if restart {
        1
    } else {
        account.login_attempts.saturating_add(1)
    };
    next.total_failed_attempts = account.total_failed_attempts.saturating_add(1);
    next.lock_until = None;
    next.last_login_attempt = Some(now);

    let outcome = match lock_after_failure(config, &next, now) {
        Some((until, reason)) => {
            next.lock_until = Some(until);
            AttemptOutcome::Rejected(Rejection::JustLocked {
                reason,
                remaining_minutes: remaining_minutes(until, now),
            })
        }
        None => AttemptOutcome::Rejected(Rejection::InvalidCredentials),
    };

    Evaluation {
        account: next,
        outcome,
        update: AccountUpdate::Failure { restart },
    }
}

/// Lock to apply after a failure, computed from post-increment counters.
///
/// Callers that increment in storage use this on the persisted row so that
/// concurrent failures agree on the decision.
pub fn lock_after_failure(
    config: &LockoutConfig,
    account: &UserAccount,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, LockReason)> {
    if account.login_attempts < config.max_login_attempts {
        return None;
    }
    let reason = config.lock_reason(account.total_failed_attempts);
    let until = now
        .checked_add_signed(config.lock_duration(account.total_failed_attempts))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Some((until, reason))
}

/// Admin unlock. Keeps the lifetime counter.
pub fn unlock_account(account: &UserAccount, now: DateTime<Utc>) -> UserAccount {
    let mut next = account.clone();
    next.login_attempts = 0;
    next.lock_until = None;
    next.last_login_attempt = Some(now);
    next
}

/// Admin reset of every failure counter.
pub fn reset_failed_attempts(account: &UserAccount) -> UserAccount {
    let mut next = account.clone();
    next.login_attempts = 0;
    next.total_failed_attempts = 0;
    next.lock_until = None;
    next
}

/// Lock status as exposed by the admin status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutInfo {
    pub is_locked: bool,
    #[serde(rename = "remainingTime", skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
    /// Full user-facing lockout text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn lockout_info(config: &LockoutConfig, account: &UserAccount, now: DateTime<Utc>) -> LockoutInfo {
    match account.lock_until.filter(|until| *until > now) {
        Some(until) => {
            let minutes = remaining_minutes(until, now);
            LockoutInfo {
                is_locked: true,
                remaining_minutes: Some(minutes),
                reason: Some(
                    config
                        .lock_reason(account.total_failed_attempts)
                        .message(minutes),
                ),
            }
        }
        None => LockoutInfo {
            is_locked: false,
            remaining_minutes: None,
            reason: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockoutState {
    Active,
    /// Some consecutive failures, still below the threshold.
    Warned,
    Locked,
    EscalatedLocked,
}

/// Classify an account. Stale counters behind an expired lock read as `Active`
/// because the next attempt starts over.
pub fn lockout_state(config: &LockoutConfig, account: &UserAccount, now: DateTime<Utc>) -> LockoutState {
    match account.lock_until {
        Some(until) if until > now => match config.lock_reason(account.total_failed_attempts) {
            LockReason::SuspiciousActivity => LockoutState::EscalatedLocked,
            LockReason::Standard => LockoutState::Locked,
        },
        Some(_) => LockoutState::Active,
        None if account.login_attempts > 0 => LockoutState::Warned,
        None => LockoutState::Active,
    }
}

/// Human-readable countdown, e.g. `"1 hour and 5 minutes"`.
pub fn format_remaining_time(minutes: i64) -> String {
    fn plural(n: i64) -> &'static str {
        if n == 1 { "" } else { "s" }
    }

    if minutes < 60 {
        return format!("{minutes} minute{}", plural(minutes));
    }

    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins > 0 {
        format!("{hours} hour{} and {mins} minute{}", plural(hours), plural(mins))
    } else {
        format!("{hours} hour{}", plural(hours))
    }
}
