//! # SkillShare Auth
//!
//! Credential authentication for SkillShare with an escalating account lockout
//! policy. After five consecutive failed logins an account is locked for two
//! hours; once an account has accumulated ten failures over its lifetime every
//! further lock lasts twenty-four hours. Administrators can inspect, unlock and
//! reset accounts, and completing a password reset lifts an active lock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use skillshare::{JwtConfig, SkillShareBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = SkillShareBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256("a-secret-of-at-least-thirty-two-bytes")?)
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     auth.register_user("learner@example.com", "hunter22", "Learner").await?;
//!     let (user, session) = auth
//!         .login_user_with_password("learner@example.com", "hunter22", None)
//!         .await?;
//!     println!("{} logged in, token expires {}", user.email, session.expires_at);
//!
//!     Ok(())
//! }
//! ```
mod builder;

use std::sync::Arc;

use chrono::Duration;
use skillshare_core::{
    repositories::{RepositoryProvider, ResetTokenRepositoryAdapter, UserRepositoryAdapter},
    services::{LockoutService, PasswordResetService, PasswordService, UserService},
};

pub use builder::{NoStorage, SkillShareBuilder, SkillShareBuilderError, WithStorage};

/// Re-export core types from skillshare_core
pub use skillshare_core::{
    AttemptOutcome, Claims, Clock, Event, EventHandler, FixedClock, JwtConfig, LockReason,
    LockoutConfig, LockoutInfo, PasswordResetToken, Rejection, Role, SessionToken, SystemClock,
    UnlockReason, UserAccount, UserId,
    error::AuthError,
    events::EventBus,
    services::{AccountLockoutStatus, LogResetTokenSender, ResetTokenSender},
};

#[cfg(feature = "sqlite")]
pub use skillshare_storage_sqlite::SqliteRepositoryProvider;

// Re-exported so `RepositoryProvider` bounds can be named by downstream crates.
pub use skillshare_core::repositories;

/// Errors returned by [`SkillShare`].
#[derive(Debug, thiserror::Error)]
pub enum SkillShareError {
    /// Credentials, tokens or permissions were rejected
    #[error(transparent)]
    Auth(AuthError),

    /// The account is locked. `message` is the user-facing lockout text.
    #[error("{message}")]
    Locked {
        message: String,
        remaining_minutes: i64,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// A session token was missing, malformed or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<skillshare_core::Error> for SkillShareError {
    fn from(error: skillshare_core::Error) -> Self {
        use skillshare_core::Error;

        match error {
            Error::Auth(AuthError::AccountLocked {
                message,
                remaining_minutes,
            }) => SkillShareError::Locked {
                message,
                remaining_minutes,
            },
            Error::Auth(AuthError::UserNotFound) => SkillShareError::NotFound("User".to_string()),
            Error::Auth(e) => SkillShareError::Auth(e),
            Error::Validation(e) => SkillShareError::Validation(e.to_string()),
            Error::Session(e) => SkillShareError::Unauthorized(e.to_string()),
            Error::Storage(e) => SkillShareError::Storage(e.to_string()),
            Error::Crypto(e) => SkillShareError::Internal(e.to_string()),
            Error::Event(e) => SkillShareError::Internal(e.to_string()),
        }
    }
}

type Users<R> = UserRepositoryAdapter<R>;
type ResetTokens<R> = ResetTokenRepositoryAdapter<R>;

/// The authentication coordinator.
///
/// Owns the services wired over one repository provider. All of them share a
/// single [`Clock`] and [`EventBus`].
pub struct SkillShare<R: RepositoryProvider> {
    repositories: Arc<R>,
    user_service: Arc<UserService<Users<R>>>,
    lockout_service: Arc<LockoutService<Users<R>>>,
    password_service: Arc<PasswordService<Users<R>>>,
    password_reset_service: Arc<PasswordResetService<Users<R>, ResetTokens<R>>>,
    reset_sender: Arc<dyn ResetTokenSender>,
    sessions: skillshare_core::SessionIssuer,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl<R: RepositoryProvider> SkillShare<R> {
    /// Create an instance with the default lockout policy, the system clock
    /// and a tracing event bus.
    pub fn new(repositories: Arc<R>, jwt_config: JwtConfig) -> Self {
        Self::from_parts(
            repositories,
            jwt_config,
            LockoutConfig::default(),
            Arc::new(SystemClock),
            EventBus::with_tracing(),
            Arc::new(LogResetTokenSender::new("/reset-password")),
            skillshare_core::token::default_reset_token_ttl(),
        )
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        jwt_config: JwtConfig,
        lockout_config: LockoutConfig,
        clock: Arc<dyn Clock>,
        events: EventBus,
        reset_sender: Arc<dyn ResetTokenSender>,
        reset_token_ttl: Duration,
    ) -> Self {
        let user_repo = Arc::new(UserRepositoryAdapter::new(repositories.clone()));
        let reset_token_repo = Arc::new(ResetTokenRepositoryAdapter::new(repositories.clone()));

        let user_service = Arc::new(
            UserService::new(user_repo.clone())
                .with_clock(clock.clone())
                .with_event_bus(events.clone()),
        );
        let lockout_service = Arc::new(
            LockoutService::new(user_repo.clone(), lockout_config)
                .with_clock(clock.clone())
                .with_event_bus(events.clone()),
        );
        let password_service = Arc::new(PasswordService::new(
            user_repo.clone(),
            user_service.clone(),
            lockout_service.clone(),
        ));
        let password_reset_service = Arc::new(
            PasswordResetService::new(user_repo, reset_token_repo, lockout_service.clone())
                .with_token_ttl(reset_token_ttl),
        );

        Self {
            repositories,
            user_service,
            lockout_service,
            password_service,
            password_reset_service,
            reset_sender,
            sessions: skillshare_core::SessionIssuer::new(jwt_config),
            clock,
            events,
        }
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), SkillShareError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| SkillShareError::Storage(e.to_string()))
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), SkillShareError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| SkillShareError::Storage(e.to_string()))
    }

    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    pub fn lockout_config(&self) -> &LockoutConfig {
        self.lockout_service.config()
    }

    /// The bus every service publishes to. Register handlers here to observe
    /// logins, locks and unlocks.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<UserAccount>, SkillShareError> {
        Ok(self.user_service.get_user(user_id).await?)
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserAccount>, SkillShareError> {
        Ok(self.user_service.get_user_by_email(email).await?)
    }

    /// Register a user with a password
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, a password outside 6..=128
    /// characters or a blank name; `Auth(UserAlreadyExists)` for a taken email.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserAccount, SkillShareError> {
        Ok(self.password_service.register(email, password, name).await?)
    }

    /// Register an account that signs in through a social provider only.
    pub async fn register_social_user(
        &self,
        email: &str,
        name: &str,
        provider: &str,
        provider_id: &str,
    ) -> Result<UserAccount, SkillShareError> {
        Ok(self
            .user_service
            .create_social_user(email, name, provider, provider_id)
            .await?)
    }

    /// Login a user with a password
    ///
    /// # Arguments
    ///
    /// * `email`: The email of the user to login
    /// * `password`: The password of the user to login
    /// * `ip_address`: Client address, recorded on the login events
    ///
    /// # Returns
    ///
    /// The user and a signed session token. A locked account fails with
    /// [`SkillShareError::Locked`] regardless of the password.
    pub async fn login_user_with_password(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<&str>,
    ) -> Result<(UserAccount, SessionToken), SkillShareError> {
        let user = self
            .password_service
            .authenticate(email, password, ip_address)
            .await?;

        let session = self.sessions.issue(&user, self.clock.now())?;

        Ok((user, session))
    }

    /// Change a user's password after verifying the current one.
    pub async fn change_user_password(
        &self,
        user_id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SkillShareError> {
        Ok(self
            .password_service
            .change_password(user_id, old_password, new_password)
            .await?)
    }

    /// Feed an externally verified attempt into the lockout policy.
    ///
    /// For callers that check credentials themselves. Returns the policy
    /// outcome rather than an error for rejected or locked attempts.
    pub async fn record_login_attempt(
        &self,
        email: &str,
        password_valid: bool,
        ip_address: Option<&str>,
    ) -> Result<AttemptOutcome, SkillShareError> {
        Ok(self
            .lockout_service
            .record_attempt(email, password_valid, ip_address)
            .await?)
    }

    pub async fn lockout_status(
        &self,
        email: &str,
    ) -> Result<AccountLockoutStatus, SkillShareError> {
        Ok(self.lockout_service.status(email).await?)
    }

    /// Clear the lock and the consecutive failure count. Idempotent.
    pub async fn unlock_account(&self, email: &str) -> Result<UserAccount, SkillShareError> {
        Ok(self.lockout_service.unlock(email).await?)
    }

    /// Clear both failure counters and the lock.
    pub async fn reset_failed_attempts(&self, email: &str) -> Result<UserAccount, SkillShareError> {
        Ok(self.lockout_service.reset_failed_attempts(email).await?)
    }

    /// Issue a reset token and hand it to the configured sender.
    ///
    /// Succeeds for unknown emails too, so callers cannot probe for accounts.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), SkillShareError> {
        if let Some((user, token)) = self.password_reset_service.request_reset(email).await? {
            self.reset_sender.send(&user, &token).await?;
        }
        Ok(())
    }

    pub async fn verify_reset_token(&self, token: &str) -> Result<bool, SkillShareError> {
        Ok(self.password_reset_service.verify_token(token).await?)
    }

    /// Set a new password with a reset token. Also lifts any active lock.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<UserAccount, SkillShareError> {
        Ok(self
            .password_reset_service
            .reset_password(token, new_password)
            .await?)
    }

    pub async fn cleanup_expired_reset_tokens(&self) -> Result<u64, SkillShareError> {
        Ok(self.password_reset_service.cleanup_expired_tokens().await?)
    }

    /// Verify a session token and return its claims.
    pub fn verify_session(&self, token: &str) -> Result<Claims, SkillShareError> {
        Ok(self.sessions.verify(token, self.clock.now())?)
    }

    /// Mint a token for the admin account-lockout endpoints.
    pub fn issue_admin_token(
        &self,
        subject: &str,
        ttl: Duration,
    ) -> Result<SessionToken, SkillShareError> {
        Ok(self
            .sessions
            .issue_admin(subject, subject, ttl, self.clock.now())?)
    }
}
