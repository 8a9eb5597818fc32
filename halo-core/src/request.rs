//! Framework-independent view of an inbound HTTP request.
//!
//! The CSRF policy and the login limiter only need a handful of request
//! properties: the method, a few headers, cookies and (sometimes) a JSON body
//! field. [`InboundRequest`] carries exactly those so the security logic can be
//! exercised without a web framework; `halo-axum` builds one from an axum
//! request.

use std::{collections::HashMap, sync::OnceLock};

use serde_json::Value;

/// Header carrying the originating client address when behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Client address used when no forwarding header is present.
///
/// Every client whose proxy does not set `x-forwarded-for` shares this single
/// rate-limit bucket.
pub const UNKNOWN_CLIENT_ADDRESS: &str = "unknown-ip";

/// Methods that never mutate state and therefore skip CSRF checks.
const SAFE_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    method: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    body: Vec<u8>,
    json: OnceLock<Option<Value>>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    /// Adds a header. Names are case-insensitive and stored lower-cased; a
    /// repeated name keeps the first value.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_insert_with(|| value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Sets the raw body. Parsing is deferred until a JSON field is requested.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.json = OnceLock::new();
        self
    }

    /// Sets a JSON body and the matching `content-type` header.
    pub fn with_json(self, value: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// `GET`, `HEAD` and `OPTIONS` (any case) are safe.
    pub fn is_safe_method(&self) -> bool {
        SAFE_METHODS
            .iter()
            .any(|safe| safe.eq_ignore_ascii_case(&self.method))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The request declares a JSON `content-type`.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    /// The body parsed as JSON, computed at most once.
    ///
    /// The content type is not consulted. Returns `None` when the body does
    /// not parse; a malformed body is treated as absent rather than an error.
    pub fn json_body(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| {
                if self.body.is_empty() {
                    return None;
                }
                serde_json::from_slice(&self.body).ok()
            })
            .as_ref()
    }

    /// A top-level string field of the JSON body.
    pub fn json_str_field(&self, field: &str) -> Option<&str> {
        self.json_body()?.get(field)?.as_str()
    }

    /// The client network address used as the rate-limit key.
    ///
    /// Takes the first (client-most) entry of `x-forwarded-for`. Falls back to
    /// [`UNKNOWN_CLIENT_ADDRESS`] when the header is missing or blank.
    pub fn client_address(&self) -> &str {
        self.header(FORWARDED_FOR_HEADER)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .unwrap_or(UNKNOWN_CLIENT_ADDRESS)
    }
}
