//! SQLite storage backend for SkillShare authentication
//!
//! ```rust,no_run
//! use skillshare_core::repositories::RepositoryProvider;
//! use skillshare_storage_sqlite::SqliteRepositoryProvider;
//!
//! # async fn run() -> Result<(), skillshare_core::Error> {
//! let provider = SqliteRepositoryProvider::connect("sqlite://skillshare.db").await?;
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```
pub mod migrations;
pub mod repositories;

pub use migrations::SqliteMigrationManager;
pub use repositories::{SqliteRepositoryProvider, SqliteResetTokenRepository, SqliteUserRepository};
pub use sqlx::SqlitePool;

use chrono::{DateTime, Utc};
use skillshare_core::{Error, error::StorageError};

/// Timestamps are stored as unix milliseconds.
pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Error::Storage(StorageError::Database(format!(
            "Invalid timestamp: {millis}"
        )))
    })
}
