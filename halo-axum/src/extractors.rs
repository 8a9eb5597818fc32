use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use halo::InboundRequest;
use halo_core::crypto::generate_session_id;

use crate::{
    error::ApiError,
    types::{AuthenticatedUser, CookieConfig, SESSION_COOKIE_NAME},
};

/// The identifier CSRF tokens are bound to for this request.
///
/// Resolved from, in order: an [`AuthenticatedUser`] extension, the session
/// cookie, or a freshly generated id. A fresh id must be sent back to the
/// client as a cookie, which `fresh` signals.
#[derive(Debug, Clone)]
pub struct SessionIdentifier {
    pub id: String,
    pub fresh: bool,
}

impl<S> FromRequestParts<S> for SessionIdentifier
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(AuthenticatedUser(uid)) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(SessionIdentifier {
                id: uid.clone(),
                fresh: false,
            });
        }

        let cookie_name = parts
            .extensions
            .get::<CookieConfig>()
            .map(|config| config.session_cookie_name.clone())
            .unwrap_or_else(|| SESSION_COOKIE_NAME.to_string());

        let jar = CookieJar::from_headers(&parts.headers);
        if let Some(cookie) = jar.get(&cookie_name).filter(|c| !c.value().is_empty()) {
            return Ok(SessionIdentifier {
                id: cookie.value().to_string(),
                fresh: false,
            });
        }

        Ok(SessionIdentifier {
            id: generate_session_id(),
            fresh: true,
        })
    }
}

/// Adapts an axum request into the framework-independent [`InboundRequest`].
///
/// Reads the whole body, so it must be the last extractor in a handler.
pub struct HaloRequest(pub InboundRequest);

impl<S> FromRequest<S> for HaloRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let mut inbound = InboundRequest::new(parts.method.as_str());
        for (name, value) in parts.headers.iter() {
            // Non-UTF-8 header values cannot carry a token or address
            if let Ok(value) = value.to_str() {
                inbound = inbound.with_header(name.as_str(), value);
            }
        }
        for cookie in CookieJar::from_headers(&parts.headers).iter() {
            inbound = inbound.with_cookie(cookie.name(), cookie.value());
        }

        let body = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        Ok(HaloRequest(inbound.with_body(body.to_vec())))
    }
}
