//! Input validation for login and signup forms.
//!
//! The login contract only needs [`validate_login_fields`] (presence). The
//! format checks are exported for signup front-ends that share these rules.

use crate::error::{ValidationError, utilities::NonBlankExt};
use regex::Regex;
use std::sync::LazyLock;

pub const LOGIN_FIELDS_REQUIRED: &str = "Email and password are required";

/// Minimum password length accepted at signup.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Loose email shape: something, `@`, something, `.`, something, no spaces.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern")
});

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-']+$").expect("Invalid name regex pattern"));

/// Check that a login submission carries both credentials.
///
/// Blank strings count as missing. Format is not checked here: a malformed
/// email is a failed login, not a bad request.
///
/// # Returns
///
/// The trimmed email and the untouched password.
pub fn validate_login_fields<'a>(
    email: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), ValidationError> {
    let email = email.non_blank().map(str::trim);
    let password = password.filter(|p| !p.is_empty());

    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(ValidationError::MissingField(
            LOGIN_FIELDS_REQUIRED.to_string(),
        )),
    }
}

/// Validates an email address
///
/// # Examples
///
/// ```rust
/// use halo_core::validation::validate_email;
///
/// assert!(validate_email("seeker@example.com").is_ok());
/// assert!(validate_email("not an email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(
            "Please enter a valid email address".to_string(),
        ))
    }
}

/// Validates a signup password.
///
/// # Password Requirements
///
/// - At least 6 characters
/// - At least one ASCII letter and one digit
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if password.chars().count() < MIN_PASSWORD_LENGTH || !has_letter || !has_digit {
        return Err(ValidationError::InvalidPassword(
            "Password must be at least 6 characters and contain both letters and numbers"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validates a display name: letters, spaces, hyphens and apostrophes only.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField(
            "Name is required".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(ValidationError::InvalidName(
            "Name must be no more than 100 characters long".to_string(),
        ));
    }

    if NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(
            "Please enter a valid name".to_string(),
        ))
    }
}
