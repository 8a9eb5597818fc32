pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("CSRF error: {0}")]
    Csrf(#[from] CsrfError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons a mutating request fails the CSRF policy.
///
/// The `Display` strings are the exact messages returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("CSRF token missing")]
    Missing,

    #[error("Invalid CSRF token")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

impl ValidationError {
    /// The client-facing message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            ValidationError::InvalidEmail(msg)
            | ValidationError::InvalidPassword(msg)
            | ValidationError::InvalidName(msg)
            | ValidationError::InvalidField(msg)
            | ValidationError::MissingField(msg) => msg,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CSRF secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },

    #[error("Invalid limiter setting: {0}")]
    InvalidLimiter(String),

    #[error("Invalid CSRF token lifetime: {0}")]
    InvalidTokenTtl(String),
}

impl Error {
    pub fn is_csrf_error(&self) -> bool {
        matches!(self, Error::Csrf(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
