//! # Halo
//!
//! Halo is the request-security layer in front of the companion app's sign-in
//! endpoint. It combines two policies from [`halo_core`] into a single login
//! contract:
//! - Stateless CSRF tokens bound to a session identifier
//! - Per-address login attempt limiting with timed lockout
//!
//! Credential checks themselves are delegated to a [`CredentialVerifier`]
//! backed by the identity platform; Halo never sees a password hash.
//!
//! ## Warning
//!
//! Lockout state lives in process memory. Running several instances behind a
//! load balancer gives each its own counters, and clients without an
//! `X-Forwarded-For` header all share the `unknown-ip` bucket.
//!
//! ## Example
//!
//! ```rust,no_run
//! use halo::{Halo, InboundRequest, StaticCredentialVerifier};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let halo = Halo::builder()
//!         .with_csrf_secret(std::env::var("HALO_CSRF_SECRET")?)
//!         .with_verifier(StaticCredentialVerifier::default())
//!         .build()?;
//!
//!     let issued = halo.issue_csrf_token("anon123");
//!     let request = InboundRequest::new("POST")
//!         .with_header("x-forwarded-for", "1.2.3.4")
//!         .with_header("x-csrf-token", issued.csrf_token)
//!         .with_json(&json!({ "email": "grace@example.com", "password": "abc123" }));
//!
//!     match halo.login(&request, "anon123").await {
//!         Ok(success) => println!("Welcome {}", success.user.uid),
//!         Err(e) => println!("{} ({})", e.message(), e.status_code()),
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use chrono::Duration;
use halo_core::{
    Clock, CredentialError, LoginAttemptRepository,
    services::{CsrfService, LoginLimiterService, RateLimitDecision, lockout_message},
    validation::validate_login_fields,
};
use serde::Serialize;

mod builder;

pub use builder::{HaloBuilder, HaloBuilderError, NoVerifier, WithVerifier};

/// Re-export core types from halo_core
///
/// These types are commonly used when working with the Halo API.
pub use halo_core::{
    CredentialVerifier, CsrfError, InMemoryLoginAttemptRepository, InboundRequest,
    LoginLimiterConfig, LoginStatus, ManualClock, StaticCredentialVerifier, SystemClock,
    ValidationError, VerifiedUser,
    credentials::StaticAccount,
    services::{CsrfConfig, CsrfToken},
};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
pub const ACCOUNT_DISABLED_MESSAGE: &str = "This account has been disabled";
pub const PROVIDER_THROTTLED_MESSAGE: &str =
    "Too many failed login attempts. Please try again later.";
pub const UPSTREAM_FAILURE_MESSAGE: &str = "An error occurred during login";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Errors that can occur when handling a login request.
///
/// Each variant maps to one HTTP status via [`LoginError::status_code`]. The
/// variants carrying a [`LoginStatus`] are reported to clients with the
/// attempt counters alongside the message.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// The client address is locked out; no other check was run
    #[error("{message}")]
    RateLimited { message: String, status: LoginStatus },

    /// The request failed the CSRF policy; no attempt was recorded
    #[error(transparent)]
    Csrf(#[from] CsrfError),

    /// The body is missing required fields
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The identity platform rejected the credentials
    #[error("{message}")]
    InvalidCredentials { message: String, status: LoginStatus },

    /// The identity platform is throttling this account
    #[error("{message}")]
    ProviderThrottled { message: String, status: LoginStatus },

    /// This failure pushed the address into lockout
    #[error("{message}")]
    LockedOut { message: String, status: LoginStatus },

    /// The identity platform failed for reasons unrelated to the credentials
    #[error("Identity provider failure: {0}")]
    Upstream(String),

    /// Lockout storage failed
    #[error("Internal error: {0}")]
    Internal(#[from] halo_core::Error),
}

impl LoginError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LoginError::RateLimited { .. }
            | LoginError::ProviderThrottled { .. }
            | LoginError::LockedOut { .. } => 429,
            LoginError::Csrf(_) => 403,
            LoginError::Validation(_) => 400,
            LoginError::InvalidCredentials { .. } => 401,
            LoginError::Upstream(_) | LoginError::Internal(_) => 500,
        }
    }

    /// The message shown to the client.
    pub fn message(&self) -> String {
        match self {
            LoginError::RateLimited { message, .. }
            | LoginError::InvalidCredentials { message, .. }
            | LoginError::ProviderThrottled { message, .. }
            | LoginError::LockedOut { message, .. } => message.clone(),
            LoginError::Csrf(e) => e.to_string(),
            LoginError::Validation(e) => e.message().to_string(),
            LoginError::Upstream(_) => UPSTREAM_FAILURE_MESSAGE.to_string(),
            LoginError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    /// Attempt counters to report with the message, if any.
    pub fn login_status(&self) -> Option<&LoginStatus> {
        match self {
            LoginError::RateLimited { status, .. }
            | LoginError::InvalidCredentials { status, .. }
            | LoginError::ProviderThrottled { status, .. }
            | LoginError::LockedOut { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Response body for a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccess {
    #[serde(flatten)]
    pub user: VerifiedUser,
    pub success: bool,
    /// Fresh token bound to the user's uid
    pub csrf_token: String,
}

/// A CSRF token handed to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCsrfToken {
    pub csrf_token: String,
    /// How long the token stays valid; also the cookie max-age
    #[serde(skip)]
    pub max_age: Duration,
}

/// The login coordinator that owns the CSRF service, the limiter and the
/// credential verifier.
///
/// `Halo` is cheap to share behind an [`Arc`]; every method takes `&self`.
pub struct Halo<R: LoginAttemptRepository, V: CredentialVerifier> {
    csrf: Arc<CsrfService>,
    limiter: Arc<LoginLimiterService<R>>,
    verifier: Arc<V>,
    clock: Arc<dyn Clock>,
}

impl Halo<InMemoryLoginAttemptRepository, StaticCredentialVerifier> {
    /// Start building a Halo instance.
    pub fn builder() -> HaloBuilder<NoVerifier, InMemoryLoginAttemptRepository> {
        HaloBuilder::new()
    }
}

impl<R: LoginAttemptRepository, V: CredentialVerifier> Halo<R, V> {
    /// Assemble a Halo instance from already constructed services.
    ///
    /// Most callers want [`Halo::builder`].
    pub fn new(
        csrf: Arc<CsrfService>,
        limiter: Arc<LoginLimiterService<R>>,
        verifier: Arc<V>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            csrf,
            limiter,
            verifier,
            clock,
        }
    }

    pub fn csrf(&self) -> &Arc<CsrfService> {
        &self.csrf
    }

    pub fn limiter(&self) -> &Arc<LoginLimiterService<R>> {
        &self.limiter
    }

    pub fn verifier(&self) -> &Arc<V> {
        &self.verifier
    }

    /// Time source shared by the CSRF service and the limiter.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Seconds until a reported lockout lifts, for a `Retry-After` header.
    pub fn retry_after_seconds(&self, status: &LoginStatus) -> Option<i64> {
        status.retry_after_seconds(self.clock.now())
    }

    /// Issue a CSRF token for `session_id`.
    pub fn issue_csrf_token(&self, session_id: &str) -> IssuedCsrfToken {
        IssuedCsrfToken {
            csrf_token: self.csrf.generate_token(session_id),
            max_age: self.csrf.token_ttl(),
        }
    }

    /// Lockout status for a client address.
    pub async fn check_login_status(&self, address: &str) -> Result<LoginStatus, LoginError> {
        Ok(self.limiter.check_login_status(address).await?)
    }

    /// Start the limiter's periodic record cleanup.
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.limiter.start_cleanup_task(shutdown)
    }

    /// Handle one login submission.
    ///
    /// Checks run in a fixed order and each stops the request on failure:
    ///
    /// 1. Lockout: a locked address gets [`LoginError::RateLimited`].
    /// 2. CSRF: the token must validate for `csrf_session_id`.
    /// 3. Body: `email` and `password` must both be present.
    /// 4. Credentials: verified by the collaborator.
    ///
    /// Only step 4 touches limiter state. A rejected credential records one
    /// failed attempt for the client address; success clears the address and
    /// rotates the CSRF token to one bound to the user's uid.
    ///
    /// # Arguments
    ///
    /// * `request` - The inbound request, with a JSON body
    /// * `csrf_session_id` - Server-trusted session id the token must match
    pub async fn login(
        &self,
        request: &InboundRequest,
        csrf_session_id: &str,
    ) -> Result<LoginSuccess, LoginError> {
        if let RateLimitDecision::Limited {
            message, status, ..
        } = self.limiter.check_request(request).await?
        {
            return Err(LoginError::RateLimited { message, status });
        }

        if let Err(e) = self.csrf.check_request(request, csrf_session_id) {
            tracing::debug!(error = %e, "Login refused by CSRF policy");
            return Err(e.into());
        }

        let (email, password) = validate_login_fields(
            request.json_str_field("email"),
            request.json_str_field("password"),
        )?;

        let address = request.client_address();

        match self.verifier.verify_credentials(email, password).await {
            Ok(user) => {
                self.limiter.reset_login_attempts(address).await?;
                let csrf_token = self.csrf.generate_token(&user.uid);
                tracing::info!(uid = %user.uid, address = %address, "Login succeeded");

                Ok(LoginSuccess {
                    user,
                    success: true,
                    csrf_token,
                })
            }
            Err(error) if !error.is_credential_failure() => {
                tracing::error!(error = %error, "Identity provider failed during login");
                Err(LoginError::Upstream(error.to_string()))
            }
            Err(error) => {
                let status = self.limiter.record_failed_attempt(address).await?;
                tracing::info!(
                    address = %address,
                    reason = %error,
                    remaining_attempts = status.remaining_attempts,
                    "Login rejected"
                );
                Err(self.rejection(&error, status))
            }
        }
    }

    fn rejection(&self, error: &CredentialError, status: LoginStatus) -> LoginError {
        let base = match error {
            CredentialError::UserDisabled => ACCOUNT_DISABLED_MESSAGE,
            CredentialError::TooManyRequests => PROVIDER_THROTTLED_MESSAGE,
            _ => INVALID_CREDENTIALS_MESSAGE,
        };

        if status.is_locked {
            let minutes = status.minutes_remaining(self.clock.now()).unwrap_or(0);
            return LoginError::LockedOut {
                message: lockout_message(minutes),
                status,
            };
        }

        let message = if status.remaining_attempts > 0 {
            format!("{base} ({} attempts remaining)", status.remaining_attempts)
        } else {
            base.to_string()
        };

        match error {
            CredentialError::TooManyRequests => LoginError::ProviderThrottled { message, status },
            _ => LoginError::InvalidCredentials { message, status },
        }
    }
}
