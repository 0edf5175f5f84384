//! End-to-end lockout behavior against SQLite with a pinned clock

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use skillshare::{
    AttemptOutcome, AuthError, FixedClock, JwtConfig, LockReason, Rejection, SkillShare,
    SkillShareBuilder, SkillShareError, SqliteRepositoryProvider,
};

const EMAIL: &str = "learner@example.com";
const PASSWORD: &str = "correct-horse";

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

async fn setup() -> (SkillShare<SqliteRepositoryProvider>, FixedClock) {
    let clock = FixedClock::new(t0());
    let auth = SkillShareBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .with_jwt(JwtConfig::new_hs256("lockout-test-secret-of-32-bytes-min").unwrap())
        .with_clock(Arc::new(clock.clone()))
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build SkillShare");

    auth.register_user(EMAIL, PASSWORD, "Learner").await.unwrap();
    (auth, clock)
}

async fn fail_login(auth: &SkillShare<SqliteRepositoryProvider>) -> SkillShareError {
    auth.login_user_with_password(EMAIL, "wrong-password", Some("203.0.113.7"))
        .await
        .expect_err("wrong password must fail")
}

#[tokio::test]
async fn test_fifth_failure_locks_for_two_hours() {
    let (auth, _clock) = setup().await;

    for _ in 0..4 {
        let err = fail_login(&auth).await;
        assert!(matches!(err, SkillShareError::Auth(AuthError::InvalidCredentials)));
    }

    match fail_login(&auth).await {
        SkillShareError::Locked {
            message,
            remaining_minutes,
        } => {
            assert_eq!(remaining_minutes, 120);
            assert_eq!(
                message,
                "Account locked after multiple failed login attempts. Please try again in 120 minutes."
            );
        }
        other => panic!("Expected lockout, got {other:?}"),
    }

    let status = auth.lockout_status(EMAIL).await.unwrap();
    assert_eq!(status.login_attempts, 5);
    assert_eq!(status.total_failed_attempts, 5);
    assert!(status.lockout_info.is_locked);
    assert_eq!(status.lockout_info.remaining_minutes, Some(120));
}

#[tokio::test]
async fn test_locked_account_rejects_correct_password() {
    let (auth, clock) = setup().await;
    for _ in 0..5 {
        fail_login(&auth).await;
    }

    clock.advance(Duration::minutes(10));
    let result = auth.login_user_with_password(EMAIL, PASSWORD, None).await;

    match result {
        Err(SkillShareError::Locked {
            remaining_minutes, ..
        }) => assert_eq!(remaining_minutes, 110),
        other => panic!("Expected lockout, got {other:?}"),
    }

    // Attempts while locked are not counted.
    let status = auth.lockout_status(EMAIL).await.unwrap();
    assert_eq!(status.login_attempts, 5);
    assert_eq!(status.total_failed_attempts, 5);
}

#[tokio::test]
async fn test_lock_expires_lazily_and_counter_restarts() {
    let (auth, clock) = setup().await;
    for _ in 0..5 {
        fail_login(&auth).await;
    }

    clock.advance(Duration::hours(2) + Duration::seconds(1));
    let err = fail_login(&auth).await;
    assert!(matches!(err, SkillShareError::Auth(AuthError::InvalidCredentials)));

    let status = auth.lockout_status(EMAIL).await.unwrap();
    assert_eq!(status.login_attempts, 1);
    assert_eq!(status.total_failed_attempts, 6);
    assert!(!status.lockout_info.is_locked);
}

#[tokio::test]
async fn test_escalated_lock_after_ten_lifetime_failures() {
    let (auth, clock) = setup().await;
    for _ in 0..5 {
        fail_login(&auth).await;
    }
    clock.advance(Duration::hours(3));

    for _ in 0..4 {
        fail_login(&auth).await;
    }

    match fail_login(&auth).await {
        SkillShareError::Locked {
            message,
            remaining_minutes,
        } => {
            assert_eq!(remaining_minutes, 24 * 60);
            assert!(message.starts_with("Account temporarily locked due to suspicious activity."));
        }
        other => panic!("Expected escalated lockout, got {other:?}"),
    }

    let status = auth.lockout_status(EMAIL).await.unwrap();
    assert_eq!(status.total_failed_attempts, 10);
    assert_eq!(
        status.lockout_info.reason.as_deref(),
        Some(LockReason::SuspiciousActivity.message(24 * 60).as_str())
    );
}

#[tokio::test]
async fn test_success_resets_consecutive_but_not_lifetime_count() {
    let (auth, _clock) = setup().await;
    for _ in 0..3 {
        fail_login(&auth).await;
    }

    let (user, session) = auth
        .login_user_with_password(EMAIL, PASSWORD, None)
        .await
        .unwrap();
    assert_eq!(user.email, EMAIL);

    let claims = auth.verify_session(&session.token).unwrap();
    assert_eq!(claims.email, EMAIL);
    assert!(!claims.is_admin());

    let status = auth.lockout_status(EMAIL).await.unwrap();
    assert_eq!(status.login_attempts, 0);
    assert_eq!(status.total_failed_attempts, 3);
    assert_eq!(status.last_login_attempt, Some(t0()));
}

#[tokio::test]
async fn test_admin_unlock_and_reset() {
    let (auth, _clock) = setup().await;
    for _ in 0..5 {
        fail_login(&auth).await;
    }

    let unlocked = auth.unlock_account(EMAIL).await.unwrap();
    assert_eq!(unlocked.login_attempts, 0);
    assert_eq!(unlocked.total_failed_attempts, 5);
    assert!(unlocked.lock_until.is_none());

    // Unlocking an unlocked account is harmless.
    auth.unlock_account(EMAIL).await.unwrap();

    auth.login_user_with_password(EMAIL, PASSWORD, None)
        .await
        .expect("login after unlock");

    let reset = auth.reset_failed_attempts(EMAIL).await.unwrap();
    assert_eq!(reset.total_failed_attempts, 0);

    assert!(matches!(
        auth.unlock_account("ghost@example.com").await,
        Err(SkillShareError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_record_login_attempt_reports_outcomes() {
    let (auth, _clock) = setup().await;

    for _ in 0..4 {
        let outcome = auth.record_login_attempt(EMAIL, false, None).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Rejected(Rejection::InvalidCredentials));
    }

    let outcome = auth.record_login_attempt(EMAIL, false, None).await.unwrap();
    assert_eq!(
        outcome,
        AttemptOutcome::Rejected(Rejection::JustLocked {
            reason: LockReason::Standard,
            remaining_minutes: 120,
        })
    );

    let outcome = auth.record_login_attempt(EMAIL, true, None).await.unwrap();
    assert_eq!(
        outcome,
        AttemptOutcome::Locked {
            remaining_minutes: 120,
            reason: LockReason::Standard,
        }
    );
}

#[tokio::test]
async fn test_unknown_email_and_social_account_share_invalid_credentials() {
    let (auth, _clock) = setup().await;
    auth.register_social_user("social@example.com", "Social", "google", "g-1")
        .await
        .unwrap();

    let unknown = auth
        .login_user_with_password("nobody@example.com", PASSWORD, None)
        .await
        .unwrap_err();
    let social = auth
        .login_user_with_password("social@example.com", PASSWORD, None)
        .await
        .unwrap_err();

    assert_eq!(unknown.to_string(), "Invalid credentials");
    assert_eq!(social.to_string(), "Invalid credentials");

    let status = auth.lockout_status("social@example.com").await.unwrap();
    assert_eq!(status.login_attempts, 0);
}

#[tokio::test]
async fn test_email_is_case_insensitive() {
    let (auth, _clock) = setup().await;

    auth.login_user_with_password("  LEARNER@Example.COM ", PASSWORD, None)
        .await
        .expect("normalized email logs in");

    let duplicate = auth
        .register_user("Learner@Example.com", PASSWORD, "Again")
        .await;
    assert!(matches!(
        duplicate,
        Err(SkillShareError::Auth(AuthError::UserAlreadyExists))
    ));
}

#[tokio::test]
async fn test_admin_token_round_trip() {
    let (auth, _clock) = setup().await;

    let token = auth
        .issue_admin_token("ops@example.com", Duration::hours(1))
        .unwrap();
    let claims = auth.verify_session(&token.token).unwrap();

    assert!(claims.is_admin());
    assert_eq!(claims.sub, "ops@example.com");
}
