use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use skillshare::{SkillShare, repositories::RepositoryProvider};

use crate::{
    error::ApiError,
    extractors::{SessionTokenFromRequest, bearer_token},
};

pub struct AppState<R: RepositoryProvider> {
    pub skillshare: Arc<SkillShare<R>>,
}

impl<R: RepositoryProvider> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            skillshare: self.skillshare.clone(),
        }
    }
}

/// Attaches the caller's [`skillshare::Claims`] to the request when a valid
/// session token is present. Never rejects.
pub async fn session_middleware<R>(
    State(state): State<AppState<R>>,
    SessionTokenFromRequest(token): SessionTokenFromRequest,
    mut request: Request,
    next: Next,
) -> Response
where
    R: RepositoryProvider,
{
    if let Some(token) = token {
        match state.skillshare.verify_session(&token) {
            Ok(claims) => {
                request.extensions_mut().insert(claims);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session token");
            }
        }
    }

    next.run(request).await
}

/// Guards the admin routes: a bearer token with the `admin` role is required.
///
/// Missing or invalid tokens get 401, valid tokens without the role get 403.
pub async fn require_admin<R>(
    State(state): State<AppState<R>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    R: RepositoryProvider,
{
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.skillshare.verify_session(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected admin token");
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })?;

    if !claims.is_admin() {
        tracing::warn!(subject = %claims.sub, "Non-admin token used on admin route");
        return Err(ApiError::Forbidden);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
