//! # Halo Axum Integration
//!
//! This crate provides Axum routes and middleware for halo's login security
//! layer: a `GET /csrf` endpoint that issues tokens and a `POST /login`
//! endpoint that enforces lockout and CSRF before checking credentials.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use halo::{Halo, StaticCredentialVerifier};
//! use halo_axum::{routes, CookieConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let halo = Halo::builder()
//!         .with_csrf_secret("a-secret-of-at-least-thirty-two-bytes!!")
//!         .with_verifier(StaticCredentialVerifier::default())
//!         .build()
//!         .unwrap();
//!
//!     let auth_routes = routes(Arc::new(halo))
//!         .with_cookie_config(CookieConfig::development())
//!         .build();
//!
//!     let app = Router::new().nest("/api", auth_routes);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use extractors::{HaloRequest, SessionIdentifier};
pub use middleware::{ALLOWED_HEADERS, CorsPolicy, HaloState, cors_middleware, trace_requests};
pub use routes::create_router;
pub use types::{
    AuthenticatedUser, CSRF_COOKIE_NAME, CookieConfig, CookieSameSite, ErrorResponse,
    LoginFailureResponse, SESSION_COOKIE_NAME,
};

use axum::Router;
use halo::{CredentialVerifier, Halo};
use halo_core::LoginAttemptRepository;
use std::sync::Arc;

/// Create the CSRF and login routes for your Axum application.
///
/// # Arguments
///
/// * `halo` - An Arc-wrapped Halo instance
///
/// # Returns
///
/// A builder whose router can be nested at any path (e.g., "/api")
pub fn routes<R, V>(halo: Arc<Halo<R, V>>) -> HaloRouterBuilder<R, V>
where
    R: LoginAttemptRepository,
    V: CredentialVerifier,
{
    HaloRouterBuilder {
        halo,
        cookie_config: CookieConfig::default(),
    }
}

/// Builder for configuring halo routes
pub struct HaloRouterBuilder<R: LoginAttemptRepository, V: CredentialVerifier> {
    halo: Arc<Halo<R, V>>,
    cookie_config: CookieConfig,
}

impl<R: LoginAttemptRepository, V: CredentialVerifier> HaloRouterBuilder<R, V> {
    /// Set custom cookie configuration
    pub fn with_cookie_config(mut self, config: CookieConfig) -> Self {
        self.cookie_config = config;
        self
    }

    /// Build the router with the configured options
    pub fn build(self) -> Router {
        create_router(self.halo, self.cookie_config)
    }
}

impl<R: LoginAttemptRepository, V: CredentialVerifier> From<HaloRouterBuilder<R, V>> for Router {
    fn from(builder: HaloRouterBuilder<R, V>) -> Self {
        builder.build()
    }
}
