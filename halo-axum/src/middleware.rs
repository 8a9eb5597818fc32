use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use halo::{CredentialVerifier, Halo};
use halo_core::LoginAttemptRepository;
use tracing::Instrument;

pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-CSRF-Token";

pub struct HaloState<R: LoginAttemptRepository, V: CredentialVerifier> {
    pub halo: Arc<Halo<R, V>>,
}

impl<R: LoginAttemptRepository, V: CredentialVerifier> Clone for HaloState<R, V> {
    fn clone(&self) -> Self {
        Self {
            halo: self.halo.clone(),
        }
    }
}

/// CORS settings for one group of routes.
#[derive(Debug, Clone, Copy)]
pub struct CorsPolicy {
    pub allow_methods: &'static str,
}

impl CorsPolicy {
    pub const fn new(allow_methods: &'static str) -> Self {
        Self { allow_methods }
    }
}

/// Adds permissive CORS headers and answers preflight requests directly.
///
/// Any origin is allowed. Deployments that serve credentials cross-origin
/// should put a stricter policy in front of these routes.
pub async fn cors_middleware(
    State(policy): State<CorsPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(policy.allow_methods),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

pub async fn trace_requests(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let response = next.run(request).await;
        tracing::info!(status = response.status().as_u16(), "Request handled");
        response
    }
    .instrument(span)
    .await
}
