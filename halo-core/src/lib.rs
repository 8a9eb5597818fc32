//! Core functionality for the halo companion service
//!
//! This crate contains the framework-independent security layer that guards
//! the login endpoint: stateless CSRF tokens bound to a session, and a
//! per-address login attempt limiter with timed lockout.
//!
//! The core crate is designed to be used as a dependency of the `halo` facade
//! and HTTP integrations and is not usually used directly by application code.
//!
//! See [`services::CsrfService`] for token issue/validation,
//! [`services::LoginLimiterService`] for lockout, and [`InboundRequest`] for the
//! request model both policies read from.
pub mod clock;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod repositories;
pub mod request;
pub mod services;
pub mod storage;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialError, CredentialVerifier, StaticCredentialVerifier, VerifiedUser};
pub use error::{ConfigError, CsrfError, Error, ValidationError};
pub use repositories::{InMemoryLoginAttemptRepository, LoginAttemptRepository};
pub use request::InboundRequest;
pub use storage::{LoginAttemptRecord, LoginLimiterConfig, LoginStatus};
