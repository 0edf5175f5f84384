//! Schema migration traits shared by the SkillShare storage backends.

use async_trait::async_trait;
use skillshare_core::error::StorageError;
use sqlx::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for skillshare_core::Error {
    fn from(e: MigrationError) -> Self {
        StorageError::Migration(e.to_string()).into()
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique, increasing version used for ordering
    fn version(&self) -> i64;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix milliseconds
    pub applied_at: i64,
}

/// One row of `skillshare status` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    pub applied_at: Option<i64>,
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_skillshare_migrations"
    }

    /// Create the tracking table if needed
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Roll back applied migrations in reverse version order
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    async fn is_applied(&self, version: i64) -> Result<bool>;

    /// Every known migration paired with its applied time, if any.
    async fn status(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<Vec<MigrationStatus>> {
        let applied = self.get_applied_migrations().await?;
        let mut status: Vec<MigrationStatus> = migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version(),
                name: m.name().to_string(),
                applied_at: applied
                    .iter()
                    .find(|r| r.version == m.version())
                    .map(|r| r.applied_at),
            })
            .collect();
        status.sort_by_key(|s| s.version);
        Ok(status)
    }
}
