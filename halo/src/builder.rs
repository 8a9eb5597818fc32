//! Builder pattern for constructing Halo instances
//!
//! This module provides a type-safe builder for creating [`Halo`] instances
//! with compile-time validation that a credential verifier was supplied.
//!
//! # Example
//!
//! ```rust,no_run
//! use halo::{Halo, LoginLimiterConfig, StaticCredentialVerifier};
//! use chrono::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let halo = Halo::builder()
//!     .with_csrf_secret("a-secret-of-at-least-thirty-two-bytes!!")
//!     .with_token_ttl(Duration::minutes(30))
//!     .with_login_limiter(LoginLimiterConfig::default())
//!     .with_verifier(StaticCredentialVerifier::default())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Duration;
use halo_core::{
    Clock, ConfigError, CredentialVerifier, InMemoryLoginAttemptRepository,
    LoginAttemptRepository, LoginLimiterConfig, SystemClock,
    services::{CsrfConfig, CsrfService, LoginLimiterService},
};

use crate::Halo;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Halo instance.
#[derive(Debug, thiserror::Error)]
pub enum HaloBuilderError {
    /// No CSRF signing secret was provided
    #[error("CSRF secret is required")]
    MissingCsrfSecret,

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no credential verifier has been configured yet.
///
/// This is the initial state of [`HaloBuilder`].
pub struct NoVerifier;

/// Marker type indicating a credential verifier has been configured.
pub struct WithVerifier<V: CredentialVerifier> {
    verifier: Arc<V>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Halo`] instances.
///
/// # Type States
///
/// - [`NoVerifier`]: Initial state, a verifier must be configured
/// - [`WithVerifier<V>`]: Verifier configured, ready to build
///
/// The repository parameter defaults to the in-memory store and can be
/// replaced with [`HaloBuilder::with_repository`].
pub struct HaloBuilder<Verifier, R: LoginAttemptRepository> {
    verifier: Verifier,
    repository: Arc<R>,
    csrf_secret: Option<Vec<u8>>,
    token_ttl: Option<Duration>,
    limiter_config: LoginLimiterConfig,
    clock: Arc<dyn Clock>,
}

impl Default for HaloBuilder<NoVerifier, InMemoryLoginAttemptRepository> {
    fn default() -> Self {
        Self::new()
    }
}

impl HaloBuilder<NoVerifier, InMemoryLoginAttemptRepository> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - CSRF token lifetime: 30 minutes
    /// - Login limiter: enabled (5 attempts, 15 min lockout, 60 min reset window)
    /// - Repository: in-memory
    /// - Clock: system clock
    pub fn new() -> Self {
        Self {
            verifier: NoVerifier,
            repository: Arc::new(InMemoryLoginAttemptRepository::new()),
            csrf_secret: None,
            token_ttl: None,
            limiter_config: LoginLimiterConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<Verifier, R: LoginAttemptRepository> HaloBuilder<Verifier, R> {
    /// Set the HMAC secret used to sign CSRF tokens (at least 32 bytes).
    pub fn with_csrf_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.csrf_secret = Some(secret.into());
        self
    }

    /// Set how long an issued CSRF token stays valid.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    /// Configure login attempt limiting.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use halo::{Halo, LoginLimiterConfig, StaticCredentialVerifier};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let halo = Halo::builder()
    ///     .with_csrf_secret("a-secret-of-at-least-thirty-two-bytes!!")
    ///     .with_login_limiter(LoginLimiterConfig {
    ///         max_failed_attempts: 3,
    ///         ..Default::default()
    ///     })
    ///     .with_verifier(StaticCredentialVerifier::default())
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_login_limiter(mut self, config: LoginLimiterConfig) -> Self {
        self.limiter_config = config;
        self
    }

    /// Replace the time source. Tests pass a [`halo_core::ManualClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different store for login attempt records.
    pub fn with_repository<R2: LoginAttemptRepository>(
        self,
        repository: Arc<R2>,
    ) -> HaloBuilder<Verifier, R2> {
        HaloBuilder {
            verifier: self.verifier,
            repository,
            csrf_secret: self.csrf_secret,
            token_ttl: self.token_ttl,
            limiter_config: self.limiter_config,
            clock: self.clock,
        }
    }
}

// ============================================================================
// Verifier Configuration (NoVerifier -> WithVerifier)
// ============================================================================

impl<R: LoginAttemptRepository> HaloBuilder<NoVerifier, R> {
    /// Configure the credential verifier.
    pub fn with_verifier<V: CredentialVerifier>(
        self,
        verifier: V,
    ) -> HaloBuilder<WithVerifier<V>, R> {
        self.with_shared_verifier(Arc::new(verifier))
    }

    /// Configure a credential verifier that is shared with other components.
    pub fn with_shared_verifier<V: CredentialVerifier>(
        self,
        verifier: Arc<V>,
    ) -> HaloBuilder<WithVerifier<V>, R> {
        HaloBuilder {
            verifier: WithVerifier { verifier },
            repository: self.repository,
            csrf_secret: self.csrf_secret,
            token_ttl: self.token_ttl,
            limiter_config: self.limiter_config,
            clock: self.clock,
        }
    }
}

// ============================================================================
// Build
// ============================================================================

impl<V: CredentialVerifier, R: LoginAttemptRepository> HaloBuilder<WithVerifier<V>, R> {
    /// Build the Halo instance.
    ///
    /// # Errors
    ///
    /// Returns [`HaloBuilderError::MissingCsrfSecret`] if no secret was set,
    /// and [`HaloBuilderError::InvalidConfiguration`] if the secret is too
    /// short or the limiter settings are unusable.
    pub fn build(self) -> Result<Halo<R, V>, HaloBuilderError> {
        let secret = self
            .csrf_secret
            .ok_or(HaloBuilderError::MissingCsrfSecret)?;

        let mut csrf_config = CsrfConfig::new(secret)?;
        if let Some(ttl) = self.token_ttl {
            csrf_config = csrf_config.with_token_ttl(ttl);
        }
        csrf_config.validate()?;

        self.limiter_config.validate()?;

        tracing::debug!(
            limiter_enabled = self.limiter_config.enabled,
            max_failed_attempts = self.limiter_config.max_failed_attempts,
            token_ttl_minutes = csrf_config.token_ttl.num_minutes(),
            "Building Halo"
        );

        let csrf = Arc::new(CsrfService::new(csrf_config, self.clock.clone()));
        let limiter = Arc::new(LoginLimiterService::new(
            self.repository,
            self.limiter_config,
            self.clock.clone(),
        ));

        Ok(Halo::new(csrf, limiter, self.verifier.verifier, self.clock))
    }
}
