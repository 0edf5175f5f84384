//! Input validation for registration and password changes.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const NAME_MAX_LENGTH: usize = 100;
const EMAIL_MAX_LENGTH: usize = 254;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Validates an email address after trimming surrounding whitespace.
///
/// ```rust
/// use skillshare_core::validation::validate_email;
///
/// assert!(validate_email("learner@example.com").is_ok());
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > EMAIL_MAX_LENGTH {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// Validates a new password.
///
/// # Password Requirements
///
/// - At least 6 characters
/// - At most 128 characters
/// - Not whitespace only
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    let length = password.chars().count();
    if length < PASSWORD_MIN_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters long"
        )));
    }

    if length > PASSWORD_MAX_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be no more than {PASSWORD_MAX_LENGTH} characters long"
        )));
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingField("Name is required".to_string()));
    }

    if name.chars().count() > NAME_MAX_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "Name must be no more than {NAME_MAX_LENGTH} characters long"
        )));
    }

    Ok(())
}

/// Runs every registration check, reporting the first failure.
pub fn validate_registration(email: &str, password: &str, name: &str) -> Result<(), ValidationError> {
    validate_name(name)?;
    validate_email(email)?;
    validate_password(password)
}
