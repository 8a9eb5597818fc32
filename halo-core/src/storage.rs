//! Records and configuration for login attempt tracking.
//!
//! A [`LoginAttemptRecord`] exists per client address that has failed at least
//! once since its last reset. Records live in a process-local store (see
//! [`crate::repositories::InMemoryLoginAttemptRepository`]); they do not
//! survive a restart and are not shared between instances.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Failure history for one client address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttemptRecord {
    /// Consecutive failures since the last reset. Seeded at 1, never 0.
    pub attempts: u32,
    /// Time of the most recent failure.
    pub last_attempt_at: DateTime<Utc>,
    /// Set once `attempts` reaches the configured maximum.
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginAttemptRecord {
    /// Record for a failure that starts a fresh window.
    pub fn first_failure(now: DateTime<Utc>) -> Self {
        Self {
            attempts: 1,
            last_attempt_at: now,
            locked_until: None,
        }
    }

    /// A lockout was set and `now` is strictly past it.
    pub fn lockout_expired(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now > until)
    }

    /// A lockout is set and has not yet expired.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some() && !self.lockout_expired(now)
    }

    /// More than `window` has passed since the last failure.
    pub fn window_elapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_attempt_at > window
    }
}

/// Lockout state reported to callers and serialised in HTTP bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStatus {
    pub is_locked: bool,
    pub remaining_attempts: u32,
    /// Epoch milliseconds on the wire, `null` when not locked.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginStatus {
    pub fn unlocked(remaining_attempts: u32) -> Self {
        Self {
            is_locked: false,
            remaining_attempts,
            locked_until: None,
        }
    }

    pub fn locked(locked_until: DateTime<Utc>) -> Self {
        Self {
            is_locked: true,
            remaining_attempts: 0,
            locked_until: Some(locked_until),
        }
    }

    /// Whole minutes until the lockout lifts, rounded up.
    ///
    /// Returns `None` when not locked.
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let millis = (self.locked_until? - now).num_milliseconds().max(0);
        Some((millis + 59_999) / 60_000)
    }

    /// Seconds until the lockout lifts, rounded up, for a `Retry-After` header.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let millis = (self.locked_until? - now).num_milliseconds().max(0);
        Some((millis + 999) / 1_000)
    }
}

/// Upper bound, in days, for any configured lockout or reset window.
pub const MAX_WINDOW_DAYS: i64 = 365;

/// Configuration for the login attempt limiter.
#[derive(Debug, Clone)]
pub struct LoginLimiterConfig {
    /// When false every check allows and nothing is recorded.
    pub enabled: bool,
    /// Failures that trigger a lockout.
    pub max_failed_attempts: u32,
    /// How long an address stays locked.
    pub lockout_duration: Duration,
    /// Inactivity after which an unlocked address starts over.
    pub attempt_reset_window: Duration,
    /// How often the background task purges dead records.
    pub cleanup_interval: std::time::Duration,
}

impl Default for LoginLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(15),
            attempt_reset_window: Duration::minutes(60),
            cleanup_interval: std::time::Duration::from_secs(3600),
        }
    }
}

impl LoginLimiterConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Rejects settings under which the limiter could never lock or unlock,
    /// or whose timestamps could overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::InvalidLimiter(
                "max_failed_attempts must be at least 1".to_string(),
            ));
        }
        let max_window = Duration::days(MAX_WINDOW_DAYS);
        if self.lockout_duration <= Duration::zero() || self.lockout_duration > max_window {
            return Err(ConfigError::InvalidLimiter(format!(
                "lockout_duration must be positive and at most {MAX_WINDOW_DAYS} days"
            )));
        }
        if self.attempt_reset_window <= Duration::zero() || self.attempt_reset_window > max_window
        {
            return Err(ConfigError::InvalidLimiter(format!(
                "attempt_reset_window must be positive and at most {MAX_WINDOW_DAYS} days"
            )));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidLimiter(
                "cleanup_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn lockout_expiry_is_strict() {
        let record = LoginAttemptRecord {
            attempts: 5,
            last_attempt_at: at(0),
            locked_until: Some(at(1_000)),
        };
        assert!(record.is_locked(at(1_000)));
        assert!(!record.lockout_expired(at(1_000)));
        assert!(record.lockout_expired(at(1_001)));
        assert!(!record.is_locked(at(1_001)));
    }

    #[test]
    fn window_elapsed_is_strict() {
        let record = LoginAttemptRecord::first_failure(at(0));
        assert!(!record.window_elapsed(at(60_000), Duration::minutes(1)));
        assert!(record.window_elapsed(at(60_001), Duration::minutes(1)));
    }

    #[test]
    fn minutes_remaining_rounds_up() {
        let status = LoginStatus::locked(at(15 * 60_000));
        assert_eq!(status.minutes_remaining(at(0)), Some(15));
        assert_eq!(status.minutes_remaining(at(1)), Some(15));
        assert_eq!(status.minutes_remaining(at(14 * 60_000 + 1)), Some(1));
        assert_eq!(status.minutes_remaining(at(20 * 60_000)), Some(0));
        assert_eq!(LoginStatus::unlocked(5).minutes_remaining(at(0)), None);
    }

    #[test]
    fn retry_after_rounds_up() {
        let status = LoginStatus::locked(at(900_000));
        assert_eq!(status.retry_after_seconds(at(0)), Some(900));
        assert_eq!(status.retry_after_seconds(at(899_500)), Some(1));
    }

    #[test]
    fn status_serialises_camel_case_with_millis() {
        let status = LoginStatus::locked(at(1_700_000_900_000));
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["isLocked"], true);
        assert_eq!(value["remainingAttempts"], 0);
        assert_eq!(value["lockedUntil"], 1_700_000_900_000i64);

        let value = serde_json::to_value(LoginStatus::unlocked(5)).unwrap();
        assert!(value["lockedUntil"].is_null());
    }

    #[test]
    fn config_validation() {
        assert!(LoginLimiterConfig::default().validate().is_ok());
        let config = LoginLimiterConfig {
            max_failed_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = LoginLimiterConfig {
            lockout_duration: Duration::zero(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_zero_cleanup_interval() {
        let config = LoginLimiterConfig {
            cleanup_interval: std::time::Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLimiter(_))
        ));
    }

    #[test]
    fn config_rejects_out_of_range_windows() {
        let config = LoginLimiterConfig {
            lockout_duration: Duration::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoginLimiterConfig {
            attempt_reset_window: Duration::days(MAX_WINDOW_DAYS + 1),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoginLimiterConfig {
            lockout_duration: Duration::days(MAX_WINDOW_DAYS),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
