//! Stateless JWT sessions.
//!
//! A successful login is answered with an HS256 token carrying:
//!
//! | Claim   | Type     | Description                              |
//! | ------- | -------- | ---------------------------------------- |
//! | `sub`   | `String` | User ID, or the operator name for admins |
//! | `email` | `String` | Normalized email                         |
//! | `role`  | `Role`   | `user` or `admin`                        |
//! | `iat`   | `i64`    | Issued-at, unix seconds                  |
//! | `exp`   | `i64`    | Expiry, unix seconds                     |
//!
//! Expiry is checked against an explicit `now` so the injected clock governs
//! session lifetime as well as lockouts.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::{CryptoError, SessionError, ValidationError},
    user::UserAccount,
};

/// Shortest accepted HS256 secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    secret: Vec<u8>,
    pub issuer: Option<String>,
    pub session_duration: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("session_duration", &self.session_duration)
            .finish()
    }
}

impl JwtConfig {
    /// Create an HS256 configuration. The secret must be at least 32 bytes.
    pub fn new_hs256(secret: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ValidationError::InvalidField(format!(
                "JWT secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        Ok(Self {
            secret,
            issuer: None,
            session_duration: Duration::days(7),
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `SessionIssuer::verify`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

/// An issued token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens.
#[derive(Debug, Clone)]
pub struct SessionIssuer {
    config: JwtConfig,
}

impl SessionIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Token for a user who just authenticated.
    pub fn issue(&self, user: &UserAccount, now: DateTime<Utc>) -> Result<SessionToken, Error> {
        self.issue_for(
            user.id.as_str(),
            &user.email,
            Role::User,
            self.config.session_duration,
            now,
        )
    }

    /// Token granting access to the admin account-lockout endpoints.
    pub fn issue_admin(
        &self,
        subject: &str,
        email: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, Error> {
        self.issue_for(subject, email, Role::Admin, ttl, now)
    }

    pub fn issue_for(
        &self,
        subject: &str,
        email: &str,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, Error> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            ValidationError::InvalidField(format!("session lifetime out of range: {ttl}"))
        })?;
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.config.encoding_key())
            .map_err(|e| CryptoError::JwtSigning(e.to_string()))?;

        Ok(SessionToken { token, expires_at })
    }

    /// Verify signature and issuer, then expiry against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Error> {
        let data = decode::<Claims>(token, &self.config.decoding_key(), &self.config.validation())
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;

        if data.claims.exp <= now.timestamp() {
            return Err(SessionError::Expired.into());
        }

        Ok(data.claims)
    }
}
