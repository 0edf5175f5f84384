use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use skillshare::{SkillShare, UserId, repositories::RepositoryProvider};

use crate::{
    error::{ApiError, Result},
    extractors::{OptionalSessionUser, SessionUser},
    middleware::{AppState, require_admin, session_middleware},
    types::*,
};

pub fn create_router<R>(skillshare: Arc<SkillShare<R>>, cookie_config: CookieConfig) -> Router
where
    R: RepositoryProvider + 'static,
{
    let state = AppState { skillshare };

    let session_routes = Router::new()
        .route("/session", get(get_session_handler))
        .route("/logout", post(logout_handler))
        .route("/password", post(change_password_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_middleware::<R>,
        ));

    let admin_routes = Router::new()
        .route(
            "/admin/account-lockout",
            get(lockout_status_handler)
                .post(lockout_action_handler)
                .put(reset_attempts_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin::<R>,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(credential_routes())
        .merge(password_reset_routes())
        .merge(session_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(axum::Extension(cookie_config))
}

fn credential_routes<R>() -> Router<AppState<R>>
where
    R: RepositoryProvider + 'static,
{
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
}

fn password_reset_routes<R>() -> Router<AppState<R>>
where
    R: RepositoryProvider + 'static,
{
    Router::new()
        .route(
            "/password/reset/request",
            post(request_password_reset_handler),
        )
        .route("/password/reset/verify", post(verify_reset_token_handler))
        .route("/password/reset/confirm", post(reset_password_handler))
}

async fn health_handler<R>(State(state): State<AppState<R>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state.skillshare.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn register_handler<R>(
    State(state): State<AppState<R>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let user = state
        .skillshare
        .register_user(&payload.email, &payload.password, &payload.name)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

async fn login_handler<R>(
    State(state): State<AppState<R>>,
    axum::Extension(cookie_config): axum::Extension<CookieConfig>,
    connection_info: ConnectionInfo,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let (user, session) = state
        .skillshare
        .login_user_with_password(
            &payload.email,
            &payload.password,
            connection_info.ip.as_deref(),
        )
        .await?;

    let same_site = match cookie_config.same_site {
        CookieSameSite::Strict => SameSite::Strict,
        CookieSameSite::Lax => SameSite::Lax,
        CookieSameSite::None => SameSite::None,
    };

    let cookie = Cookie::build((cookie_config.name, session.token.clone()))
        .path(cookie_config.path)
        .http_only(cookie_config.http_only)
        .secure(cookie_config.secure)
        .same_site(same_site);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(AuthResponse {
            user,
            token: session.token,
        }),
    ))
}

async fn get_session_handler(SessionUser(claims): SessionUser) -> Result<impl IntoResponse> {
    Ok(Json(SessionResponse { session: claims }))
}

// Tokens are stateless; logging out only drops the cookie.
async fn logout_handler(
    OptionalSessionUser(claims): OptionalSessionUser,
    jar: CookieJar,
    axum::Extension(cookie_config): axum::Extension<CookieConfig>,
) -> Result<impl IntoResponse> {
    if let Some(claims) = claims {
        tracing::info!(user_id = %claims.sub, "User logged out");
    }
    let jar = jar.remove(Cookie::build((cookie_config.name, "")).path(cookie_config.path));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Successfully logged out".to_string(),
        }),
    ))
}

async fn change_password_handler<R>(
    State(state): State<AppState<R>>,
    SessionUser(claims): SessionUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .skillshare
        .change_user_password(
            &UserId::new(&claims.sub),
            &payload.old_password,
            &payload.new_password,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

async fn request_password_reset_handler<R>(
    State(state): State<AppState<R>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .skillshare
        .request_password_reset(&payload.email)
        .await?;

    Ok(Json(MessageResponse {
        message: "If a user with that email exists, a password reset link has been sent."
            .to_string(),
    }))
}

async fn verify_reset_token_handler<R>(
    State(state): State<AppState<R>>,
    Json(payload): Json<VerifyResetTokenRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let valid = state.skillshare.verify_reset_token(&payload.token).await?;

    Ok(Json(VerifyResetTokenResponse { valid }))
}

async fn reset_password_handler<R>(
    State(state): State<AppState<R>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .skillshare
        .reset_password(&payload.token, &payload.password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset successfully".to_string(),
    }))
}

fn required_email(email: Option<&str>, message: &str) -> Result<String> {
    email
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

async fn lockout_status_handler<R>(
    State(state): State<AppState<R>>,
    Query(query): Query<LockoutQuery>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let email = required_email(query.email.as_deref(), "Email parameter is required")?;
    let status = state.skillshare.lockout_status(&email).await?;

    Ok(Json(status))
}

async fn lockout_action_handler<R>(
    State(state): State<AppState<R>>,
    SessionUser(admin): SessionUser,
    Json(payload): Json<LockoutActionRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let (Some(email), Some(action)) = (payload.email.as_deref(), payload.action.as_deref()) else {
        return Err(ApiError::BadRequest(
            "Email and action are required".to_string(),
        ));
    };
    let email = required_email(Some(email), "Email and action are required")?;

    if action != "unlock" {
        return Err(ApiError::BadRequest(
            "Invalid action. Use 'unlock'".to_string(),
        ));
    }

    let account = state.skillshare.unlock_account(&email).await?;
    tracing::info!(admin = %admin.sub, email = %account.email, "Admin unlocked account");

    Ok(Json(LockoutActionResponse {
        success: true,
        message: "Account has been unlocked successfully".to_string(),
        email: account.email,
    }))
}

async fn reset_attempts_handler<R>(
    State(state): State<AppState<R>>,
    SessionUser(admin): SessionUser,
    Json(payload): Json<ResetAttemptsRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let email = required_email(payload.email.as_deref(), "Email is required")?;

    let account = state.skillshare.reset_failed_attempts(&email).await?;
    tracing::info!(admin = %admin.sub, email = %account.email, "Admin reset login attempts");

    Ok(Json(LockoutActionResponse {
        success: true,
        message: "Login attempts have been reset successfully".to_string(),
        email: account.email,
    }))
}
