//! CSRF token service.
//!
//! Tokens are stateless: nothing is stored server-side. A token is the
//! colon-joined triple `issuedAtMillis:nonce:signature`, where the signature is
//! an HMAC-SHA256 over `issuedAtMillis:nonce:sessionId` under a server secret.
//! A token is valid only for the session it was issued to and only for
//! [`CsrfConfig::token_ttl`] after issue. There is no revocation list; a fresh
//! token is issued after every successful login and older ones simply age out.
//!
//! # Trusted session ids
//!
//! [`CsrfService::validate_token`] recomputes the signature with whatever
//! session id the caller passes in. Anyone who can choose that value for a
//! victim can mint a matching token, so callers must take it from a source the
//! client cannot set (a server-issued HttpOnly cookie or a verified auth
//! context), never from a request body or custom header.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use halo_core::{SystemClock, services::{CsrfConfig, CsrfService}};
//!
//! let config = CsrfConfig::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap();
//! let service = CsrfService::new(config, Arc::new(SystemClock));
//!
//! let token = service.generate_token("anon123");
//! assert!(service.validate_token(&token, "anon123"));
//! assert!(!service.validate_token(&token, "someone-else"));
//! ```

use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, Utc};

use crate::{
    clock::Clock,
    crypto::{constant_time_compare, generate_nonce, sign},
    error::{ConfigError, CsrfError},
    request::InboundRequest,
    storage::MAX_WINDOW_DAYS,
};

/// Request header carrying the token on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// JSON body field consulted when the header is absent.
pub const CSRF_BODY_FIELD: &str = "_csrf";

/// Shortest accepted signing secret.
pub const MIN_SECRET_BYTES: usize = 32;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// HMAC key for CSRF signatures. `Debug` never prints the key.
#[derive(Clone)]
pub struct CsrfSecret(Vec<u8>);

impl CsrfSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret {
                min: MIN_SECRET_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CsrfSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub secret: CsrfSecret,
    pub token_ttl: Duration,
}

impl CsrfConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        Ok(Self {
            secret: CsrfSecret::new(secret)?,
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        })
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// A token must live for a positive time of at most a year.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl <= Duration::zero() || self.token_ttl > Duration::days(MAX_WINDOW_DAYS)
        {
            return Err(ConfigError::InvalidTokenTtl(format!(
                "must be positive and at most {MAX_WINDOW_DAYS} days"
            )));
        }
        Ok(())
    }
}

/// A parsed CSRF token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub issued_at: DateTime<Utc>,
    pub nonce: String,
    pub signature: String,
}

impl CsrfToken {
    fn signing_input(issued_at: DateTime<Utc>, nonce: &str, session_id: &str) -> String {
        format!("{}:{nonce}:{session_id}", issued_at.timestamp_millis())
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.issued_at.timestamp_millis(),
            self.nonce,
            self.signature
        )
    }
}

impl FromStr for CsrfToken {
    type Err = CsrfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [issued_at, nonce, signature] = parts.as_slice() else {
            return Err(CsrfError::Invalid);
        };

        let millis: i64 = issued_at.parse().map_err(|_| CsrfError::Invalid)?;
        let issued_at = DateTime::from_timestamp_millis(millis).ok_or(CsrfError::Invalid)?;

        Ok(Self {
            issued_at,
            nonce: (*nonce).to_string(),
            signature: (*signature).to_string(),
        })
    }
}

/// Issues and validates session-bound CSRF tokens.
#[derive(Debug)]
pub struct CsrfService {
    config: CsrfConfig,
    clock: Arc<dyn Clock>,
}

impl CsrfService {
    pub fn new(config: CsrfConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    pub fn token_ttl(&self) -> Duration {
        self.config.token_ttl
    }

    /// Issue a fresh token bound to `session_id`.
    ///
    /// Any string works as a session id, including a throwaway anonymous one,
    /// so forms can be protected before login.
    pub fn issue(&self, session_id: &str) -> CsrfToken {
        let issued_at = self.clock.now();
        let nonce = generate_nonce();
        let signature = sign(
            self.config.secret.expose(),
            &CsrfToken::signing_input(issued_at, &nonce, session_id),
        );

        CsrfToken {
            issued_at,
            nonce,
            signature,
        }
    }

    /// Issue a fresh token and return its wire form.
    pub fn generate_token(&self, session_id: &str) -> String {
        self.issue(session_id).to_string()
    }

    /// Check a token against the session id the caller vouches for.
    ///
    /// Never fails: empty, malformed, expired or mis-signed tokens are all
    /// simply `false`. See the module docs for where `session_id` must come from.
    pub fn validate_token(&self, token: &str, session_id: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let Ok(parsed) = token.parse::<CsrfToken>() else {
            tracing::debug!("Rejected CSRF token: malformed");
            return false;
        };

        if self.clock.now() - parsed.issued_at > self.config.token_ttl {
            tracing::debug!(issued_at = %parsed.issued_at, "Rejected CSRF token: expired");
            return false;
        }

        let expected = sign(
            self.config.secret.expose(),
            &CsrfToken::signing_input(parsed.issued_at, &parsed.nonce, session_id),
        );

        let valid = constant_time_compare(parsed.signature.as_bytes(), expected.as_bytes());
        if !valid {
            tracing::debug!("Rejected CSRF token: signature mismatch");
        }
        valid
    }

    /// The token a request presents: the `X-CSRF-Token` header, falling back
    /// to the `_csrf` field of a body sent as JSON. Empty values count as
    /// absent.
    pub fn token_from_request<'a>(&self, request: &'a InboundRequest) -> Option<&'a str> {
        request
            .header(CSRF_HEADER)
            .filter(|token| !token.is_empty())
            .or_else(|| {
                request
                    .is_json()
                    .then(|| request.json_str_field(CSRF_BODY_FIELD))
                    .flatten()
                    .filter(|token| !token.is_empty())
            })
    }

    /// Apply the CSRF policy to a request.
    ///
    /// Safe methods (`GET`, `HEAD`, `OPTIONS`) always pass without looking at
    /// any token. Other methods need a token that validates for `session_id`.
    pub fn check_request(&self, request: &InboundRequest, session_id: &str) -> Result<(), CsrfError> {
        if request.is_safe_method() {
            return Ok(());
        }

        let token = self.token_from_request(request).ok_or(CsrfError::Missing)?;

        if self.validate_token(token, session_id) {
            Ok(())
        } else {
            Err(CsrfError::Invalid)
        }
    }
}
