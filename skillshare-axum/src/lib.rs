//! # SkillShare Axum Integration
//!
//! Axum routes for SkillShare authentication: registration, password login
//! with account lockout, password reset, and the admin account-lockout
//! endpoints.
//!
//! ## Routes
//!
//! - `GET /health`
//! - `POST /register`, `POST /login`
//! - `GET /session`, `POST /logout`, `POST /password`
//! - `POST /password/reset/request`, `/password/reset/verify`, `/password/reset/confirm`
//! - `GET|POST|PUT /admin/account-lockout` (admin bearer token required)
//!
//! A locked account answers `POST /login` with `423 Locked` and a body of
//! `{ "error": ..., "code": 423, "remainingMinutes": ... }`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use skillshare::{JwtConfig, SkillShareBuilder};
//! use skillshare_axum::{routes, CookieConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let skillshare = SkillShareBuilder::new()
//!         .with_sqlite("sqlite://skillshare.db")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(std::env::var("JWT_SECRET")?)?)
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let auth_routes = routes(Arc::new(skillshare))
//!         .with_cookie_config(CookieConfig::development());
//!
//!     let app = Router::new().nest("/api/auth", auth_routes.build());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use extractors::{OptionalSessionUser, SessionTokenFromRequest, SessionUser};
pub use middleware::{AppState, require_admin, session_middleware};
pub use routes::create_router;
pub use types::{
    AuthResponse, ChangePasswordRequest, ConnectionInfo, CookieConfig, CookieSameSite,
    HealthResponse, LockoutActionRequest, LockoutActionResponse, LockoutQuery, LoginRequest,
    MessageResponse, PasswordResetRequest, RegisterRequest, ResetAttemptsRequest,
    ResetPasswordRequest, SessionResponse, UserResponse, VerifyResetTokenRequest,
    VerifyResetTokenResponse,
};

use std::sync::Arc;

use axum::Router;
use skillshare::{SkillShare, repositories::RepositoryProvider};

/// Create the SkillShare routes.
///
/// The returned builder produces a router that can be nested at any path.
pub fn routes<R>(skillshare: Arc<SkillShare<R>>) -> AuthRouterBuilder<R>
where
    R: RepositoryProvider + 'static,
{
    AuthRouterBuilder {
        skillshare,
        cookie_config: CookieConfig::default(),
    }
}

/// Builder for configuring authentication routes
pub struct AuthRouterBuilder<R: RepositoryProvider> {
    skillshare: Arc<SkillShare<R>>,
    cookie_config: CookieConfig,
}

impl<R: RepositoryProvider + 'static> AuthRouterBuilder<R> {
    /// Set custom cookie configuration
    pub fn with_cookie_config(mut self, config: CookieConfig) -> Self {
        self.cookie_config = config;
        self
    }

    pub fn build(self) -> Router {
        create_router(self.skillshare, self.cookie_config)
    }
}

impl<R: RepositoryProvider + 'static> From<AuthRouterBuilder<R>> for Router {
    fn from(builder: AuthRouterBuilder<R>) -> Self {
        builder.build()
    }
}
