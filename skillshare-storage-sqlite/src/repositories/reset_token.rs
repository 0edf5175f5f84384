//! SQLite implementation of the password reset token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skillshare_core::{
    Error, PasswordResetToken, UserId, error::utilities::DatabaseResultExt,
    repositories::ResetTokenRepository,
};
use sqlx::SqlitePool;

use crate::from_millis;

pub struct SqliteResetTokenRepository {
    pool: SqlitePool,
}

impl SqliteResetTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteResetToken {
    token_hash: String,
    user_id: String,
    expires_at: i64,
    used_at: Option<i64>,
    created_at: i64,
}

impl TryFrom<SqliteResetToken> for PasswordResetToken {
    type Error = Error;

    fn try_from(row: SqliteResetToken) -> Result<Self, Self::Error> {
        Ok(PasswordResetToken {
            token_hash: row.token_hash,
            user_id: UserId::new(&row.user_id),
            expires_at: from_millis(row.expires_at)?,
            used_at: row.used_at.map(from_millis).transpose()?,
            created_at: from_millis(row.created_at)?,
        })
    }
}

#[async_trait]
impl ResetTokenRepository for SqliteResetTokenRepository {
    async fn create(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetToken, Error> {
        let now = now.timestamp_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_db_err_with_context("Failed to begin transaction")?;

        sqlx::query(
            "UPDATE password_reset_tokens SET used_at = ?2 WHERE user_id = ?1 AND used_at IS NULL",
        )
        .bind(user_id.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_db_err_with_context("Failed to invalidate previous reset tokens")?;

        let row = sqlx::query_as::<_, SqliteResetToken>(
            r#"
            INSERT INTO password_reset_tokens (token_hash, user_id, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .bind(user_id.as_str())
        .bind(expires_at.timestamp_millis())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_db_err_with_context("Failed to create reset token")?;

        tx.commit()
            .await
            .map_db_err_with_context("Failed to commit reset token")?;

        row.try_into()
    }

    async fn find_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error> {
        let row = sqlx::query_as::<_, SqliteResetToken>(
            r#"
            SELECT * FROM password_reset_tokens
            WHERE token_hash = ?1 AND used_at IS NULL AND expires_at > ?2
            "#,
        )
        .bind(token_hash)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find reset token")?;

        row.map(PasswordResetToken::try_from).transpose()
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PasswordResetToken>, Error> {
        let row = sqlx::query_as::<_, SqliteResetToken>(
            r#"
            UPDATE password_reset_tokens
            SET used_at = ?2
            WHERE token_hash = ?1 AND used_at IS NULL AND expires_at > ?2
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to consume reset token")?;

        row.map(PasswordResetToken::try_from).transpose()
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= ?1")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete expired reset tokens")?;

        Ok(result.rows_affected())
    }
}
