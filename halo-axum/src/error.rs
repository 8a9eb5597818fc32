use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use halo::LoginError;
use thiserror::Error;

use crate::types::{ErrorResponse, LoginFailureResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Login(#[from] LoginError),

    /// A lockout refusal with the seconds left, sent as `Retry-After`.
    #[error("{error}")]
    RetryLater {
        error: LoginError,
        retry_after_seconds: i64,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Wrap a login failure, attaching `Retry-After` when the seconds are known.
    pub fn from_login(error: LoginError, retry_after_seconds: Option<i64>) -> Self {
        match retry_after_seconds {
            Some(retry_after_seconds) => ApiError::RetryLater {
                error,
                retry_after_seconds,
            },
            None => ApiError::Login(error),
        }
    }
}

fn login_response(err: LoginError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if let LoginError::Upstream(_) | LoginError::Internal(_) = &err {
        tracing::error!(error = %err, "Login failed with a server error");
    }

    match err.login_status() {
        Some(login_status) => (
            status,
            Json(LoginFailureResponse {
                error: err.message(),
                status: login_status.clone(),
            }),
        )
            .into_response(),
        None => (
            status,
            Json(ErrorResponse {
                error: err.message(),
            }),
        )
            .into_response(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Login(err) => login_response(err),
            ApiError::RetryLater {
                error,
                retry_after_seconds,
            } => {
                let mut response = login_response(error);
                if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: msg }),
            )
                .into_response(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
