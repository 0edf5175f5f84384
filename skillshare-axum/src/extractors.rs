use std::net::SocketAddr;

use axum::{
    Extension, RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use axum_extra::{TypedHeader, extract::CookieJar, headers::UserAgent};
use skillshare::Claims;

use crate::{
    error::ApiError,
    types::{ConnectionInfo, CookieConfig},
};

impl<S> FromRequestParts<S> for ConnectionInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .extract::<Option<TypedHeader<UserAgent>>>()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid user agent header"))?
            .map(|ua| ua.to_string());

        // The first hop of X-Forwarded-For wins over the socket peer.
        let forwarded = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());

        let ip = match forwarded {
            Some(ip) => Some(ip),
            None => parts
                .extract::<ConnectInfo<SocketAddr>>()
                .await
                .ok()
                .map(|addr| addr.ip().to_string()),
        };

        Ok(ConnectionInfo { ip, user_agent })
    }
}

/// Claims of a verified session. Requires [`crate::session_middleware`].
pub struct SessionUser(pub Claims);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Extension(claims): Extension<Claims> = parts
            .extract()
            .await
            .map_err(|_| ApiError::Unauthorized("Authentication required".to_string()))?;

        Ok(SessionUser(claims))
    }
}

pub struct OptionalSessionUser(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalSessionUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalSessionUser(parts.extensions.get::<Claims>().cloned()))
    }
}

/// The raw session token, from the `Authorization: Bearer` header or else
/// the session cookie.
pub struct SessionTokenFromRequest(pub Option<String>);

impl<S> FromRequestParts<S> for SessionTokenFromRequest
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            return Ok(SessionTokenFromRequest(Some(token)));
        }

        let cookie_name = parts
            .extensions
            .get::<CookieConfig>()
            .map(|config| config.name.clone())
            .unwrap_or_else(|| CookieConfig::default().name);

        let jar = parts
            .extract::<CookieJar>()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid cookie header"))?;

        let token = jar
            .get(&cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());

        Ok(SessionTokenFromRequest(token))
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
