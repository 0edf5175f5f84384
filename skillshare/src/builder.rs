//! Builder pattern for constructing [`SkillShare`] instances
//!
//! Storage must be configured before anything else; the type state makes a
//! builder without storage impossible to `build()`.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use skillshare::{JwtConfig, LockoutConfig, SkillShareBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = SkillShareBuilder::new()
//!         .with_sqlite("sqlite://skillshare.db")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(std::env::var("JWT_SECRET")?)?)
//!         .with_lockout_config(LockoutConfig {
//!             max_login_attempts: 3,
//!             ..LockoutConfig::default()
//!         })
//!         .with_reset_token_ttl(Duration::minutes(30))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use skillshare_core::{
    Clock, EventBus, JwtConfig, LockoutConfig, SystemClock, repositories::RepositoryProvider,
    services::{LogResetTokenSender, ResetTokenSender},
    token::default_reset_token_ttl,
};

use crate::SkillShare;

/// Errors that can occur when building a SkillShare instance.
#[derive(Debug, thiserror::Error)]
pub enum SkillShareBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`SkillShare`] instances.
///
/// # Defaults
///
/// - Lockout: 5 attempts, 2 hour lock, escalation at 10 lifetime failures, 24 hour lock
/// - Clock: [`SystemClock`]
/// - Events: a bus that logs every event through `tracing`
/// - Reset tokens: valid for 1 hour, delivered by [`LogResetTokenSender`]
/// - Apply migrations: false
pub struct SkillShareBuilder<Storage> {
    storage: Storage,
    jwt_config: Option<JwtConfig>,
    lockout_config: LockoutConfig,
    clock: Arc<dyn Clock>,
    events: EventBus,
    reset_sender: Arc<dyn ResetTokenSender>,
    reset_token_ttl: Duration,
    apply_migrations: bool,
}

impl Default for SkillShareBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillShareBuilder<NoStorage> {
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            jwt_config: None,
            lockout_config: LockoutConfig::default(),
            clock: Arc::new(SystemClock),
            events: EventBus::with_tracing(),
            reset_sender: Arc::new(LogResetTokenSender::new("/reset-password")),
            reset_token_ttl: default_reset_token_ttl(),
            apply_migrations: false,
        }
    }

    /// Use an already constructed repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> SkillShareBuilder<WithStorage<R>> {
        SkillShareBuilder {
            storage: WithStorage { repositories },
            jwt_config: self.jwt_config,
            lockout_config: self.lockout_config,
            clock: self.clock,
            events: self.events,
            reset_sender: self.reset_sender,
            reset_token_ttl: self.reset_token_ttl,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl SkillShareBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        SkillShareBuilder<WithStorage<crate::SqliteRepositoryProvider>>,
        SkillShareBuilderError,
    > {
        let repositories = crate::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| SkillShareBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(repositories)))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: skillshare_storage_sqlite::SqlitePool,
    ) -> SkillShareBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

impl<S> SkillShareBuilder<S> {
    /// Signing configuration for session and admin tokens. Required.
    pub fn with_jwt(mut self, config: JwtConfig) -> Self {
        self.jwt_config = Some(config);
        self
    }

    pub fn with_lockout_config(mut self, config: LockoutConfig) -> Self {
        self.lockout_config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// How reset tokens reach their owner.
    pub fn with_reset_sender(mut self, sender: Arc<dyn ResetTokenSender>) -> Self {
        self.reset_sender = sender;
        self
    }

    pub fn with_reset_token_ttl(mut self, ttl: Duration) -> Self {
        self.reset_token_ttl = ttl;
        self
    }

    /// Run pending migrations during [`SkillShareBuilder::build`].
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<R: RepositoryProvider> SkillShareBuilder<WithStorage<R>> {
    /// Build the configured [`SkillShare`] instance.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when no JWT configuration was given or the
    /// lockout policy is inconsistent; `Migration` when requested migrations fail.
    pub async fn build(self) -> Result<SkillShare<R>, SkillShareBuilderError> {
        let jwt_config = self.jwt_config.ok_or_else(|| {
            SkillShareBuilderError::InvalidConfiguration("JWT configuration is required".to_string())
        })?;

        self.lockout_config
            .validate()
            .map_err(|e| SkillShareBuilderError::InvalidConfiguration(e.to_string()))?;

        if self.reset_token_ttl <= Duration::zero() {
            return Err(SkillShareBuilderError::InvalidConfiguration(
                "reset token TTL must be positive".to_string(),
            ));
        }

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| SkillShareBuilderError::Migration(e.to_string()))?;
        }

        Ok(SkillShare::from_parts(
            self.storage.repositories,
            jwt_config,
            self.lockout_config,
            self.clock,
            self.events,
            self.reset_sender,
            self.reset_token_ttl,
        ))
    }
}
