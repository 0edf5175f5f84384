//! Repository implementations for SQLite storage

pub mod reset_token;
pub mod user;

pub use reset_token::SqliteResetTokenRepository;
pub use user::SqliteUserRepository;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use skillshare_core::{
    Error,
    error::StorageError,
    repositories::{RepositoryProvider, ResetTokenRepositoryProvider, UserRepositoryProvider},
};
use skillshare_migration::{MigrationManager, MigrationStatus};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::migrations::{SqliteMigrationManager, migrations};

/// Repository provider implementation for SQLite
///
/// Implements the individual repository provider traits as well as the
/// unified [`RepositoryProvider`] trait. Every repository shares one pool.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    reset_token: Arc<SqliteResetTokenRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(SqliteUserRepository::new(pool.clone()));
        let reset_token = Arc::new(SqliteResetTokenRepository::new(pool.clone()));

        Self {
            pool,
            user,
            reset_token,
        }
    }

    /// Open a pool for `url`, creating the database file if it does not exist.
    ///
    /// `sqlite::memory:` is accepted for tests and throwaway servers.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url, "Failed to connect to SQLite");
                Error::Storage(StorageError::Connection(e.to_string()))
            })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Every known migration and whether it has been applied.
    pub async fn migration_status(&self) -> Result<Vec<MigrationStatus>, Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await?;
        Ok(manager.status(&migrations()).await?)
    }
}

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl ResetTokenRepositoryProvider for SqliteRepositoryProvider {
    type ResetTokenRepo = SqliteResetTokenRepository;

    fn reset_token(&self) -> &Self::ResetTokenRepo {
        &self.reset_token
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
