use std::sync::Arc;

use crate::{
    Error, crypto,
    error::AuthError,
    events::Event,
    lockout::{AttemptOutcome, Rejection},
    repositories::UserRepository,
    services::{LockoutService, UserService},
    user::{NewUserAccount, UserAccount, UserId, normalize_email},
    validation::{validate_password, validate_registration},
};

/// Credential registration and login, guarded by the lockout policy.
pub struct PasswordService<U: UserRepository> {
    repository: Arc<U>,
    user_service: Arc<UserService<U>>,
    lockout: Arc<LockoutService<U>>,
}

impl<U: UserRepository> PasswordService<U> {
    pub fn new(
        repository: Arc<U>,
        user_service: Arc<UserService<U>>,
        lockout: Arc<LockoutService<U>>,
    ) -> Self {
        Self {
            repository,
            user_service,
            lockout,
        }
    }

    /// Register a new credential account.
    ///
    /// # Errors
    ///
    /// Validation errors for a malformed email, a password outside 6..=128
    /// characters or a blank name; `UserAlreadyExists` for a taken email.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<UserAccount, Error> {
        validate_registration(email, password, name)?;

        let password_hash = crypto::hash_password(password);
        self.user_service
            .create_user(NewUserAccount::with_password(email, name, password_hash))
            .await
    }

    /// Authenticate with email and password.
    ///
    /// Unknown emails, wrong passwords and accounts without a password all
    /// fail with `InvalidCredentials`. A locked account fails with
    /// `AccountLocked` before the password is looked at.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<&str>,
    ) -> Result<UserAccount, Error> {
        let email = normalize_email(email);
        let Some(account) = self.repository.find_by_email(&email).await? else {
            tracing::debug!(email = %email, "Login for unknown email");
            crypto::verify_dummy_password(password);
            return Err(AuthError::InvalidCredentials.into());
        };

        let Some(password_hash) = account.password_hash.as_deref() else {
            tracing::debug!(email = %email, "Password login for account without password");
            crypto::verify_dummy_password(password);
            return Err(AuthError::InvalidCredentials.into());
        };

        let now = self.lockout.clock().now();
        if let Some(locked) = self.lockout.check_locked(&account, now) {
            return Err(locked_error(&locked));
        }

        let password_valid = crypto::verify_password(password, password_hash)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))?;

        let record = self
            .lockout
            .apply(&account, password_valid, ip_address, now)
            .await?;

        match record.outcome {
            AttemptOutcome::Accepted => Ok(record.account),
            AttemptOutcome::Rejected(Rejection::InvalidCredentials) => {
                Err(AuthError::InvalidCredentials.into())
            }
            locked => Err(locked_error(&locked)),
        }
    }

    /// Change the password of an authenticated user. Lockout state is untouched.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        validate_password(new_password)?;

        let user = self
            .repository
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let current_hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !crypto::verify_password(old_password, current_hash)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))?
        {
            return Err(AuthError::InvalidCredentials.into());
        }

        let new_hash = crypto::hash_password(new_password);
        self.repository
            .set_password_hash(user_id, &new_hash, self.lockout.clock().now())
            .await?;

        self.lockout
            .events()
            .publish(Event::PasswordChanged {
                user_id: user_id.clone(),
            })
            .await;

        Ok(())
    }
}

fn locked_error(outcome: &AttemptOutcome) -> Error {
    match outcome.lockout() {
        Some((message, remaining_minutes)) => AuthError::AccountLocked {
            message,
            remaining_minutes,
        }
        .into(),
        None => AuthError::InvalidCredentials.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        lockout::LockoutConfig,
        services::mock::MockUserRepository,
    };
    use chrono::{DateTime, Duration, Utc};

    const EMAIL: &str = "learner@example.com";
    const PASSWORD: &str = "hunter22";

    struct Fixture {
        service: PasswordService<MockUserRepository>,
        repository: Arc<MockUserRepository>,
        clock: FixedClock,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(MockUserRepository::default());
        let clock = FixedClock::new(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap());
        let user_service = Arc::new(
            UserService::new(repository.clone()).with_clock(Arc::new(clock.clone())),
        );
        let lockout = Arc::new(
            LockoutService::new(repository.clone(), LockoutConfig::default())
                .with_clock(Arc::new(clock.clone())),
        );
        Fixture {
            service: PasswordService::new(repository.clone(), user_service, lockout),
            repository,
            clock,
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD, "Learner").await.unwrap();
        assert!(user.has_password());
        assert_ne!(user.password_hash.as_deref(), Some(PASSWORD));

        let authenticated = f
            .service
            .authenticate("LEARNER@example.com", PASSWORD, None)
            .await
            .unwrap();
        assert_eq!(authenticated.id, user.id);
        assert_eq!(authenticated.login_attempts, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password_and_duplicates() {
        let f = fixture();
        assert!(
            f.service
                .register(EMAIL, "12345", "Learner")
                .await
                .unwrap_err()
                .is_validation_error()
        );

        f.service.register(EMAIL, PASSWORD, "Learner").await.unwrap();
        assert!(matches!(
            f.service.register(EMAIL, PASSWORD, "Again").await,
            Err(Error::Auth(AuthError::UserAlreadyExists))
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let f = fixture();
        f.service.register(EMAIL, PASSWORD, "Learner").await.unwrap();

        let unknown = f.service.authenticate("ghost@example.com", PASSWORD, None).await.unwrap_err();
        let wrong = f.service.authenticate(EMAIL, "nope-nope", None).await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(f.repository.get(EMAIL).await.unwrap().login_attempts, 1);
    }

    #[tokio::test]
    async fn test_social_account_rejected_without_counting() {
        let f = fixture();
        f.repository
            .insert(
                UserAccount::builder()
                    .email("social@example.com")
                    .name("Social")
                    .provider(Some("github".to_string()), Some("7".to_string()))
                    .build()
                    .unwrap(),
            )
            .await;

        let result = f.service.authenticate("social@example.com", PASSWORD, None).await;
        assert!(matches!(result, Err(Error::Auth(AuthError::InvalidCredentials))));

        let stored = f.repository.get("social@example.com").await.unwrap();
        assert_eq!(stored.login_attempts, 0);
        assert_eq!(stored.total_failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_fifth_failure_reports_new_lock() {
        let f = fixture();
        f.service.register(EMAIL, PASSWORD, "Learner").await.unwrap();

        for _ in 0..4 {
            let err = f.service.authenticate(EMAIL, "wrong-pw", None).await.unwrap_err();
            assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        }

        let err = f.service.authenticate(EMAIL, "wrong-pw", None).await.unwrap_err();
        assert_eq!(err.lockout_minutes(), Some(120));
        assert_eq!(
            err.to_string(),
            "Authentication error: Account locked after multiple failed login attempts. Please try again in 120 minutes."
        );
    }

    #[tokio::test]
    async fn test_correct_password_while_locked_is_refused() {
        let f = fixture();
        f.service.register(EMAIL, PASSWORD, "Learner").await.unwrap();
        for _ in 0..5 {
            let _ = f.service.authenticate(EMAIL, "wrong-pw", None).await;
        }

        f.clock.advance(Duration::minutes(10));
        let err = f.service.authenticate(EMAIL, PASSWORD, None).await.unwrap_err();
        assert_eq!(err.lockout_minutes(), Some(110));
        assert_eq!(f.repository.get(EMAIL).await.unwrap().login_attempts, 5);

        f.clock.advance(Duration::minutes(111));
        let user = f.service.authenticate(EMAIL, PASSWORD, None).await.unwrap();
        assert_eq!(user.login_attempts, 0);
        assert_eq!(user.total_failed_attempts, 5);
        assert!(user.lock_until.is_none());
    }

    #[tokio::test]
    async fn test_change_password() {
        let f = fixture();
        let user = f.service.register(EMAIL, PASSWORD, "Learner").await.unwrap();

        assert!(matches!(
            f.service.change_password(&user.id, "wrong-pw", "new-secret").await,
            Err(Error::Auth(AuthError::InvalidCredentials))
        ));
        assert!(
            f.service
                .change_password(&user.id, PASSWORD, "short")
                .await
                .unwrap_err()
                .is_validation_error()
        );

        f.service
            .change_password(&user.id, PASSWORD, "new-secret")
            .await
            .unwrap();
        assert!(f.service.authenticate(EMAIL, "new-secret", None).await.is_ok());
        assert!(f.service.authenticate(EMAIL, PASSWORD, None).await.is_err());
    }
}
