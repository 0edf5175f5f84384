use std::net::SocketAddr;

use chrono::Duration;
use clap::Parser;
use skillshare::{JwtConfig, LockoutConfig};

const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

fn minutes(value: i64) -> Result<Duration, ConfigError> {
    Duration::try_minutes(value)
        .ok_or_else(|| ConfigError::Lockout(format!("{value} minutes is out of range")))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid lockout policy: {0}")]
    Lockout(String),

    #[error("Invalid JWT configuration: {0}")]
    Jwt(String),

    #[error("{0}")]
    Invalid(String),
}

/// HTTP server for SkillShare authentication
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[arg(long, env = "SKILLSHARE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://skillshare.db")]
    pub database_url: String,

    /// HS256 signing secret for session tokens, at least 32 bytes
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Session token lifetime in hours
    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = 24 * 7)]
    pub session_ttl_hours: i64,

    /// Consecutive failures before an account is locked
    #[arg(long, env = "LOCKOUT_MAX_ATTEMPTS", default_value_t = 5)]
    pub lockout_max_attempts: u32,

    /// Standard lock length in minutes
    #[arg(long, env = "LOCKOUT_DURATION_MINUTES", default_value_t = 120)]
    pub lockout_duration_minutes: i64,

    /// Lifetime failures at which the extended lock applies
    #[arg(long, env = "LOCKOUT_ESCALATION_ATTEMPTS", default_value_t = 10)]
    pub lockout_escalation_attempts: u32,

    /// Extended lock length in minutes
    #[arg(long, env = "LOCKOUT_EXTENDED_DURATION_MINUTES", default_value_t = 24 * 60)]
    pub lockout_extended_duration_minutes: i64,

    /// Link prefix for password reset tokens, e.g. `https://app.example.com/reset-password`
    #[arg(long, env = "RESET_URL_BASE", default_value = "http://localhost:3000/auth/reset-password")]
    pub reset_url_base: String,

    /// Path the auth routes are mounted under
    #[arg(long, env = "SKILLSHARE_BASE_PATH", default_value = "/api/auth")]
    pub base_path: String,

    /// Send session cookies without the `Secure` attribute
    #[arg(long, env = "SKILLSHARE_INSECURE_COOKIES")]
    pub insecure_cookies: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("lockout", &self.lockout_config().ok())
            .field("base_path", &self.base_path)
            .finish()
    }
}

impl ServerConfig {
    pub fn lockout_config(&self) -> Result<LockoutConfig, ConfigError> {
        let config = LockoutConfig::new(
            self.lockout_max_attempts,
            minutes(self.lockout_duration_minutes)?,
            self.lockout_escalation_attempts,
            minutes(self.lockout_extended_duration_minutes)?,
        );
        config
            .validate()
            .map_err(|e| ConfigError::Lockout(e.to_string()))?;
        Ok(config)
    }

    pub fn jwt_config(&self) -> Result<JwtConfig, ConfigError> {
        if self.session_ttl_hours <= 0 || self.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(ConfigError::Jwt(format!(
                "session TTL must be between 1 and {MAX_SESSION_TTL_HOURS} hours"
            )));
        }
        let ttl = Duration::try_hours(self.session_ttl_hours)
            .ok_or_else(|| ConfigError::Jwt("session TTL out of range".to_string()))?;

        let config = JwtConfig::new_hs256(self.jwt_secret.as_bytes())
            .map_err(|e| ConfigError::Jwt(e.to_string()))?
            .with_session_duration(ttl);
        Ok(config)
    }

    /// Check everything that can be checked before touching the database.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lockout_config()?;
        self.jwt_config()?;
        if !self.base_path.starts_with('/') || self.base_path.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "base path must start with '/' and not be the root: {}",
                self.base_path
            )));
        }
        Ok(())
    }
}
