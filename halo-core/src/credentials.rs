//! Credential verification collaborator.
//!
//! Halo never stores passwords itself. A [`CredentialVerifier`] is asked to
//! check an email/password pair and either returns the identity fields or a
//! [`CredentialError`] describing why the sign-in was refused.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::constant_time_compare;

/// Identity returned by a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("User not found")]
    UserNotFound,

    #[error("Wrong password")]
    WrongPassword,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("User disabled")]
    UserDisabled,

    #[error("Too many requests")]
    TooManyRequests,

    /// The identity platform failed for reasons unrelated to the credentials.
    #[error("Identity provider error: {0}")]
    Upstream(String),
}

impl CredentialError {
    /// Map an identity platform error code such as `auth/wrong-password`.
    ///
    /// Unknown codes are treated as upstream failures.
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/user-not-found" => CredentialError::UserNotFound,
            "auth/wrong-password" => CredentialError::WrongPassword,
            "auth/invalid-credential" => CredentialError::InvalidCredential,
            "auth/user-disabled" => CredentialError::UserDisabled,
            "auth/too-many-requests" => CredentialError::TooManyRequests,
            other => CredentialError::Upstream(other.to_string()),
        }
    }

    /// Whether this error means the caller presented a bad or refused
    /// credential, as opposed to the provider being unavailable.
    pub fn is_credential_failure(&self) -> bool {
        !matches!(self, CredentialError::Upstream(_))
    }
}

/// Checks an email/password pair against an identity platform.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedUser, CredentialError>;
}

/// One account known to a [`StaticCredentialVerifier`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAccount {
    pub uid: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl std::fmt::Debug for StaticAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAccount")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl StaticAccount {
    pub fn new(
        uid: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            password: password.into(),
            display_name: None,
            email_verified: false,
            disabled: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn verified(mut self) -> Self {
        self.email_verified = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Fixed in-memory account list for development servers and tests.
///
/// Emails match case-insensitively; passwords compare in constant time.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialVerifier {
    accounts: HashMap<String, StaticAccount>,
}

impl StaticCredentialVerifier {
    pub fn new(accounts: impl IntoIterator<Item = StaticAccount>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.email.to_lowercase(), account))
            .collect();
        Self { accounts }
    }

    /// Load accounts from a JSON array of [`StaticAccount`] objects.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let accounts: Vec<StaticAccount> = serde_json::from_str(json)?;
        Ok(Self::new(accounts))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedUser, CredentialError> {
        let account = self
            .accounts
            .get(&email.to_lowercase())
            .ok_or(CredentialError::UserNotFound)?;

        if !constant_time_compare(account.password.as_bytes(), password.as_bytes()) {
            return Err(CredentialError::WrongPassword);
        }

        if account.disabled {
            return Err(CredentialError::UserDisabled);
        }

        Ok(VerifiedUser {
            uid: account.uid.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            email_verified: account.email_verified,
        })
    }
}
