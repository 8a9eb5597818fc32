//! Cryptographic utilities for anti-forgery tokens
//!
//! This module provides the primitives behind CSRF tokens: random nonces,
//! anonymous session identifiers, HMAC-SHA256 signatures and constant-time
//! verification.
//!
//! # Security
//!
//! Signature verification is vulnerable to timing attacks when using standard
//! string comparison because the comparison may exit early on the first
//! mismatch, creating measurable timing differences. Every signature check in
//! this crate goes through [`constant_time_compare`], which uses the `subtle`
//! crate.
//!
//! See: <https://cheatsheetseries.owasp.org/cheatsheets/Cross-Site_Request_Forgery_Prevention_Cheat_Sheet.html#signed-double-submit-cookie-recommended>

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a CSRF nonce.
pub const NONCE_BYTES: usize = 16;

/// Number of random bytes in an anonymous session identifier.
pub const SESSION_ID_BYTES: usize = 16;

/// Generate a random nonce for a CSRF token.
///
/// Produces 128 bits from the OS random number generator, hex encoded
/// (32 characters). Hex never contains the `:` token separator.
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure (e.g., /dev/urandom unavailable) from which recovery is not
/// possible for security-sensitive operations.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    hex::encode(bytes)
}

/// Generate a random identifier for an anonymous (pre-login) session.
///
/// The value is URL-safe base64 without padding so it can be placed in a
/// cookie verbatim.
///
/// # Panics
///
/// Panics if the OS random number generator fails, see [`generate_nonce`].
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute a hex-encoded HMAC-SHA256 of `message` under `secret`.
pub fn sign(secret: &[u8], message: &str) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Perform constant-time comparison of two byte slices.
///
/// This function uses the `subtle` crate to ensure the comparison takes
/// the same amount of time regardless of where (or if) the bytes differ.
/// Slices of different length compare unequal; the length of a hex HMAC is
/// public, so the early return leaks nothing.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
