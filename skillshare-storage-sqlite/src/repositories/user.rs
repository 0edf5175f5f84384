//! SQLite implementation of the user repository.
//!
//! The lockout counter updates are single guarded `UPDATE ... RETURNING`
//! statements. SQLite evaluates every `SET` expression against the row as it
//! was before the statement, so the `CASE` below sees the old `lock_until`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skillshare_core::{
    Error, NewUserAccount, UserAccount, UserId,
    error::{AuthError, StorageError, utilities::DatabaseResultExt},
    repositories::UserRepository,
};
use sqlx::SqlitePool;

use crate::from_millis;

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteUser {
    id: String,
    email: String,
    name: String,
    password_hash: Option<String>,
    provider: Option<String>,
    provider_id: Option<String>,
    email_verified_at: Option<i64>,
    login_attempts: i64,
    total_failed_attempts: i64,
    lock_until: Option<i64>,
    last_login_attempt: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteUser> for UserAccount {
    type Error = Error;

    fn try_from(row: SqliteUser) -> Result<Self, Self::Error> {
        Ok(UserAccount {
            id: UserId::new(&row.id),
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            provider: row.provider,
            provider_id: row.provider_id,
            email_verified_at: row.email_verified_at.map(from_millis).transpose()?,
            login_attempts: row.login_attempts.max(0) as u32,
            total_failed_attempts: row.total_failed_attempts.max(0) as u32,
            lock_until: row.lock_until.map(from_millis).transpose()?,
            last_login_attempt: row.last_login_attempt.map(from_millis).transpose()?,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

fn into_account(row: Option<SqliteUser>) -> Result<Option<UserAccount>, Error> {
    row.map(UserAccount::try_from).transpose()
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &NewUserAccount, now: DateTime<Utc>) -> Result<UserAccount, Error> {
        let now = now.timestamp_millis();

        let row = sqlx::query_as::<_, SqliteUser>(
            r#"
            INSERT INTO users (id, email, name, password_hash, provider, provider_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.provider)
        .bind(&user.provider_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Auth(AuthError::UserAlreadyExists)
            }
            e => {
                tracing::error!(error = %e, "Failed to create user");
                Error::Storage(StorageError::Database("Failed to create user".to_string()))
            }
        })?;

        row.try_into()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_db_err_with_context("Failed to find user by email")?;

        into_account(row)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>("SELECT * FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_db_err_with_context("Failed to find user by id")?;

        into_account(row)
    }

    async fn set_password_hash(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.as_str())
            .bind(password_hash)
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to set password hash")?;

        Ok(())
    }

    async fn reset_password(
        &self,
        id: &UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?2, login_attempts = 0, lock_until = NULL, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .bind(password_hash)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to reset password")?;

        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error> {
        // The WHERE clause only admits rows with no lock or an expired one, so
        // a non-null lock_until here means the lock lapsed and the run restarts.
        let row = sqlx::query_as::<_, SqliteUser>(
            r#"
            UPDATE users
            SET login_attempts = CASE WHEN lock_until IS NOT NULL THEN 1 ELSE login_attempts + 1 END,
                total_failed_attempts = total_failed_attempts + 1,
                lock_until = NULL,
                last_login_attempt = ?2,
                updated_at = ?2
            WHERE email = ?1 AND (lock_until IS NULL OR lock_until <= ?2)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to record failed login attempt")?;

        into_account(row)
    }

    async fn lock_if_unlocked(
        &self,
        email: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET lock_until = ?2, updated_at = ?3
            WHERE email = ?1 AND (lock_until IS NULL OR lock_until <= ?3)
            "#,
        )
        .bind(email)
        .bind(until.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to lock account")?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_successful_login(&self, email: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET login_attempts = 0, lock_until = NULL, last_login_attempt = ?2, updated_at = ?2
            WHERE email = ?1 AND (lock_until IS NULL OR lock_until <= ?2)
            "#,
        )
        .bind(email)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to record successful login")?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlock(&self, email: &str, now: DateTime<Utc>) -> Result<Option<UserAccount>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>(
            r#"
            UPDATE users
            SET login_attempts = 0, lock_until = NULL, last_login_attempt = ?2, updated_at = ?2
            WHERE email = ?1
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to unlock account")?;

        into_account(row)
    }

    async fn reset_failed_attempts(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>(
            r#"
            UPDATE users
            SET login_attempts = 0, total_failed_attempts = 0, lock_until = NULL, updated_at = ?2
            WHERE email = ?1
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to reset failed attempts")?;

        into_account(row)
    }
}
