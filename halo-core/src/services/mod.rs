//! Service layer for request security
//!
//! This module contains the two stateful policies applied to login requests:
//! CSRF token issue/validation and per-address login lockout.

pub mod csrf;
pub mod login_limiter;

pub use csrf::{CSRF_BODY_FIELD, CSRF_HEADER, CsrfConfig, CsrfSecret, CsrfService, CsrfToken};
pub use login_limiter::{LoginLimiterService, RateLimitDecision, lockout_message};
