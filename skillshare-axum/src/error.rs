use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use skillshare::{AuthError, SkillShareError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{message}")]
    Locked {
        message: String,
        remaining_minutes: i64,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Admin privileges required")]
    Forbidden,

    #[error("Internal server error")]
    Internal(String),
}

impl From<SkillShareError> for ApiError {
    fn from(err: SkillShareError) -> Self {
        match err {
            SkillShareError::Locked {
                message,
                remaining_minutes,
            } => ApiError::Locked {
                message,
                remaining_minutes,
            },
            SkillShareError::Auth(AuthError::InvalidCredentials) => ApiError::InvalidCredentials,
            SkillShareError::Auth(AuthError::UserAlreadyExists) => ApiError::EmailAlreadyRegistered,
            SkillShareError::Auth(AuthError::InvalidResetToken) => {
                ApiError::BadRequest("Invalid or expired reset token".to_string())
            }
            SkillShareError::NotFound(what) => ApiError::NotFound(what),
            SkillShareError::Validation(msg) => ApiError::BadRequest(msg),
            SkillShareError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidCredentials | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Locked { .. } => StatusCode::LOCKED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EmailAlreadyRegistered => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            ApiError::Locked {
                message,
                remaining_minutes,
            } => json!({
                "error": message,
                "code": status.as_u16(),
                "remainingMinutes": remaining_minutes,
            }),
            _ => json!({
                "error": self.to_string(),
                "code": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_locked_response_carries_remaining_minutes() {
        let response = ApiError::Locked {
            message: "Account locked".to_string(),
            remaining_minutes: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::LOCKED);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Account locked", "code": 423, "remainingMinutes": 42 })
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::Internal("disk I/O error".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Internal server error");
    }

    #[test]
    fn test_facade_error_mapping() {
        assert!(matches!(
            ApiError::from(SkillShareError::Auth(AuthError::UserAlreadyExists)),
            ApiError::EmailAlreadyRegistered
        ));
        assert!(matches!(
            ApiError::from(SkillShareError::NotFound("User".to_string())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(SkillShareError::Storage("gone".to_string())),
            ApiError::Internal(_)
        ));
    }
}
