use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use halo::{CredentialVerifier, Halo};
use halo_core::LoginAttemptRepository;

use crate::{
    error::{ApiError, Result},
    extractors::{HaloRequest, SessionIdentifier},
    middleware::{CorsPolicy, HaloState, cors_middleware, trace_requests},
    types::CookieConfig,
};

pub fn create_router<R, V>(halo: Arc<Halo<R, V>>, cookie_config: CookieConfig) -> Router
where
    R: LoginAttemptRepository,
    V: CredentialVerifier,
{
    let state = HaloState { halo };

    let csrf_routes = Router::new()
        .route("/csrf", get(csrf_handler::<R, V>).options(preflight_handler))
        .layer(from_fn_with_state(
            CorsPolicy::new("GET, OPTIONS"),
            cors_middleware,
        ));

    let login_routes = Router::new()
        .route(
            "/login",
            post(login_handler::<R, V>).options(preflight_handler),
        )
        .layer(from_fn_with_state(
            CorsPolicy::new("POST, OPTIONS"),
            cors_middleware,
        ));

    Router::new()
        .merge(csrf_routes)
        .merge(login_routes)
        .with_state(state)
        .layer(Extension(cookie_config))
        .layer(from_fn(trace_requests))
}

async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn csrf_handler<R, V>(
    State(state): State<HaloState<R, V>>,
    Extension(cookie_config): Extension<CookieConfig>,
    jar: CookieJar,
    session: SessionIdentifier,
) -> impl IntoResponse
where
    R: LoginAttemptRepository,
    V: CredentialVerifier,
{
    let issued = state.halo.issue_csrf_token(&session.id);

    let mut jar = jar.add(cookie_config.build_cookie(
        &cookie_config.csrf_cookie_name,
        issued.csrf_token.clone(),
        issued.max_age,
    ));

    if session.fresh {
        tracing::debug!("Issued anonymous session id");
        jar = jar.add(cookie_config.build_cookie(
            &cookie_config.session_cookie_name,
            session.id,
            issued.max_age,
        ));
    }

    (jar, Json(issued))
}

async fn login_handler<R, V>(
    State(state): State<HaloState<R, V>>,
    Extension(cookie_config): Extension<CookieConfig>,
    jar: CookieJar,
    session: SessionIdentifier,
    HaloRequest(request): HaloRequest,
) -> Result<impl IntoResponse>
where
    R: LoginAttemptRepository,
    V: CredentialVerifier,
{
    let success = state
        .halo
        .login(&request, &session.id)
        .await
        .map_err(|err| {
            let retry_after = err
                .login_status()
                .and_then(|status| state.halo.retry_after_seconds(status));
            ApiError::from_login(err, retry_after)
        })?;

    let jar = jar.add(cookie_config.build_cookie(
        &cookie_config.csrf_cookie_name,
        success.csrf_token.clone(),
        state.halo.csrf().token_ttl(),
    ));

    Ok((jar, Json(success)))
}
