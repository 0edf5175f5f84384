pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Shared by unknown emails and wrong passwords so callers cannot probe for accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account is locked. `message` is the user-facing lockout text.
    #[error("{message}")]
    AccountLocked {
        message: String,
        remaining_minutes: i64,
    },

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Password hash error: {0}")]
    PasswordHashError(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Returns the remaining lock time if this error reports a locked account.
    pub fn lockout_minutes(&self) -> Option<i64> {
        match self {
            Error::Auth(AuthError::AccountLocked {
                remaining_minutes, ..
            }) => Some(*remaining_minutes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_share_wording() {
        let err: Error = AuthError::InvalidCredentials.into();

        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_account_locked_displays_message_verbatim() {
        let locked = AuthError::AccountLocked {
            message: "Account locked after multiple failed login attempts. Please try again in 110 minutes.".to_string(),
            remaining_minutes: 110,
        };
        assert_eq!(
            locked.to_string(),
            "Account locked after multiple failed login attempts. Please try again in 110 minutes."
        );

        let error: Error = locked.into();
        assert_eq!(error.lockout_minutes(), Some(110));
    }

    #[test]
    fn test_lockout_minutes_absent_for_other_errors() {
        assert_eq!(
            Error::Auth(AuthError::InvalidCredentials).lockout_minutes(),
            None
        );
        assert_eq!(
            Error::Storage(StorageError::Database("busy".to_string())).lockout_minutes(),
            None
        );
    }

    #[test]
    fn test_policy_errors_are_validation_errors() {
        let err: Error = ValidationError::InvalidPassword("too short".to_string()).into();

        assert!(err.is_validation_error());
        assert_eq!(err.to_string(), "Validation error: Invalid password: too short");
        assert!(!Error::Auth(AuthError::InvalidResetToken).is_validation_error());
    }
}
