use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Duration;
use serde::Serialize;

use halo::LoginStatus;

pub const CSRF_COOKIE_NAME: &str = "csrf-token";
pub const SESSION_COOKIE_NAME: &str = "session-id";

/// Body for errors that carry only a message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body for login failures that report attempt counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginFailureResponse {
    pub error: String,
    #[serde(flatten)]
    pub status: LoginStatus,
}

/// Identity set by a host authentication layer.
///
/// Insert this as a request extension ahead of the halo routes and CSRF
/// tokens will be bound to the user id instead of the anonymous session
/// cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub csrf_cookie_name: String,
    pub session_cookie_name: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: CookieSameSite,
    pub path: String,
    /// Overrides the cookie lifetime; defaults to the CSRF token lifetime
    pub max_age: Option<Duration>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::production()
    }
}

#[derive(Debug, Clone, Default)]
pub enum CookieSameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl From<&CookieSameSite> for SameSite {
    fn from(value: &CookieSameSite) -> Self {
        match value {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        }
    }
}

impl CookieConfig {
    /// `Secure` cookies, for deployments served over HTTPS.
    pub fn production() -> Self {
        Self {
            csrf_cookie_name: CSRF_COOKIE_NAME.to_string(),
            session_cookie_name: SESSION_COOKIE_NAME.to_string(),
            http_only: true,
            secure: true,
            same_site: CookieSameSite::Strict,
            path: "/".to_string(),
            max_age: None,
        }
    }

    /// Same as [`CookieConfig::production`] without `Secure`, for local HTTP.
    pub fn development() -> Self {
        Self {
            secure: false,
            ..Self::production()
        }
    }

    pub fn for_environment(production: bool) -> Self {
        if production {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// Build a cookie with these attributes.
    ///
    /// `default_max_age` applies unless [`CookieConfig::max_age`] is set.
    pub fn build_cookie(
        &self,
        name: &str,
        value: String,
        default_max_age: Duration,
    ) -> Cookie<'static> {
        let max_age = self.max_age.unwrap_or(default_max_age);

        Cookie::build((name.to_string(), value))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(SameSite::from(&self.same_site))
            .max_age(time::Duration::seconds(max_age.num_seconds()))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_cookie_attributes() {
        let cookie = CookieConfig::production().build_cookie(
            CSRF_COOKIE_NAME,
            "tok".to_string(),
            Duration::minutes(30),
        );
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("csrf-token=tok"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=1800"));
    }

    #[test]
    fn test_development_cookie_not_secure() {
        let cookie = CookieConfig::development().build_cookie(
            SESSION_COOKIE_NAME,
            "abc".to_string(),
            Duration::minutes(30),
        );
        assert!(!cookie.to_string().contains("Secure"));
        assert!(!CookieConfig::for_environment(false).secure);
        assert!(CookieConfig::for_environment(true).secure);
    }

    #[test]
    fn test_failure_body_flattens_status() {
        let until = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let body = LoginFailureResponse {
            error: "locked".to_string(),
            status: LoginStatus::locked(until),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "error": "locked",
                "isLocked": true,
                "remainingAttempts": 0,
                "lockedUntil": 1_700_000_000_000i64
            })
        );
    }
}
