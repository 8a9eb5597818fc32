//! Login attempt limiter for address-based lockout.
//!
//! This module tracks failed logins per client network address and locks an
//! address out for a fixed period once it reaches the failure threshold.
//!
//! # Rules
//!
//! - The first failure of a window seeds `attempts` at 1, so it already counts.
//! - Reaching `max_failed_attempts` sets `locked_until = now + lockout_duration`.
//! - Failures while locked change nothing: the lockout is never extended.
//! - A lockout that has passed, or an unlocked record idle for longer than the
//!   reset window, is treated as absent and the next failure starts over.
//! - A successful login deletes the record outright.
//!
//! # Example
//!
//! ```rust,ignore
//! use halo_core::services::LoginLimiterService;
//!
//! let status = limiter.check_login_status("1.2.3.4").await?;
//! if status.is_locked {
//!     // Reject before checking credentials
//! }
//!
//! // After the credential check fails
//! let status = limiter.record_failed_attempt("1.2.3.4").await?;
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};

use crate::{
    Error,
    clock::Clock,
    repositories::LoginAttemptRepository,
    request::InboundRequest,
    storage::{LoginAttemptRecord, LoginLimiterConfig, LoginStatus},
};

/// Outcome of the pre-flight rate-limit gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited {
        message: String,
        minutes_remaining: i64,
        status: LoginStatus,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// User-facing lockout message.
pub fn lockout_message(minutes_remaining: i64) -> String {
    format!("Too many failed login attempts. Please try again in {minutes_remaining} minutes.")
}

/// Service for tracking failed logins and enforcing lockout.
///
/// # Thread Safety
///
/// This service is thread-safe and can be shared across multiple tasks. Each
/// read-modify-write of an address's record goes through
/// [`LoginAttemptRepository::update`], which is atomic per key.
pub struct LoginLimiterService<R: LoginAttemptRepository> {
    repository: Arc<R>,
    config: LoginLimiterConfig,
    clock: Arc<dyn Clock>,
}

impl<R: LoginAttemptRepository> LoginLimiterService<R> {
    /// Create a new LoginLimiterService.
    ///
    /// # Arguments
    ///
    /// * `repository` - Store for per-address records
    /// * `config` - Thresholds and windows
    /// * `clock` - Time source for every window comparison
    pub fn new(repository: Arc<R>, config: LoginLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            config,
            clock,
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LoginLimiterConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn fresh_status(&self) -> LoginStatus {
        LoginStatus::unlocked(self.config.max_failed_attempts)
    }

    fn status_of(&self, record: &LoginAttemptRecord, now: DateTime<Utc>) -> LoginStatus {
        match record.locked_until {
            Some(until) if record.is_locked(now) => LoginStatus::locked(until),
            _ => LoginStatus::unlocked(
                self.config
                    .max_failed_attempts
                    .saturating_sub(record.attempts),
            ),
        }
    }

    /// A record that no longer affects any decision.
    fn is_dead(&self, record: &LoginAttemptRecord, now: DateTime<Utc>) -> bool {
        record.lockout_expired(now)
            || (record.locked_until.is_none()
                && record.window_elapsed(now, self.config.attempt_reset_window))
    }

    /// Record one failed credential check for `address`.
    ///
    /// Call exactly once per failed login. If protection is disabled this is
    /// a no-op reporting a fresh, unlocked status.
    ///
    /// # Returns
    ///
    /// The lockout status after the failure is counted.
    pub async fn record_failed_attempt(&self, address: &str) -> Result<LoginStatus, Error> {
        if !self.config.enabled {
            return Ok(self.fresh_status());
        }

        let now = self.clock.now();
        let config = &self.config;
        let newly_locked = AtomicBool::new(false);

        let stored = self
            .repository
            .update(address, &|current| {
                let next = match current {
                    None => LoginAttemptRecord::first_failure(now),
                    Some(record) if record.lockout_expired(now) => {
                        LoginAttemptRecord::first_failure(now)
                    }
                    // Already locked: leave the record (and its expiry) alone
                    Some(record) if record.locked_until.is_some() => record.clone(),
                    Some(record) if record.window_elapsed(now, config.attempt_reset_window) => {
                        LoginAttemptRecord::first_failure(now)
                    }
                    Some(record) => {
                        let attempts = record.attempts.saturating_add(1);
                        let locked_until = (attempts >= config.max_failed_attempts).then(|| {
                            now.checked_add_signed(config.lockout_duration)
                                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                        });
                        newly_locked.store(locked_until.is_some(), Ordering::Relaxed);
                        LoginAttemptRecord {
                            attempts,
                            last_attempt_at: now,
                            locked_until,
                        }
                    }
                };
                Some(next)
            })
            .await?;

        let status = stored
            .map(|record| self.status_of(&record, now))
            .unwrap_or_else(|| self.fresh_status());

        if newly_locked.load(Ordering::Relaxed) {
            tracing::warn!(
                address = %address,
                locked_until = ?status.locked_until,
                "Client address locked out after repeated failed logins"
            );
        } else {
            tracing::debug!(
                address = %address,
                remaining_attempts = status.remaining_attempts,
                is_locked = status.is_locked,
                "Recorded failed login attempt"
            );
        }

        Ok(status)
    }

    /// Report the lockout status for `address` without counting an attempt.
    ///
    /// A record whose lockout has passed is purged and reported as fresh. Any
    /// other record is left as is, so an idle window still reports its count
    /// until the next failure starts it over.
    pub async fn check_login_status(&self, address: &str) -> Result<LoginStatus, Error> {
        if !self.config.enabled {
            return Ok(self.fresh_status());
        }

        let now = self.clock.now();
        let stored = self
            .repository
            .update(address, &|current| match current {
                Some(record) if record.lockout_expired(now) => None,
                other => other.cloned(),
            })
            .await?;

        Ok(stored
            .map(|record| self.status_of(&record, now))
            .unwrap_or_else(|| self.fresh_status()))
    }

    /// Check if an address is currently locked (convenience method).
    pub async fn is_locked(&self, address: &str) -> Result<bool, Error> {
        Ok(self.check_login_status(address).await?.is_locked)
    }

    /// Forget all failures for `address`.
    ///
    /// Called after a verified-successful login; clears history entirely
    /// rather than decrementing.
    pub async fn reset_login_attempts(&self, address: &str) -> Result<(), Error> {
        if self.repository.remove(address).await? {
            tracing::debug!(address = %address, "Cleared failed login attempts");
        }
        Ok(())
    }

    /// Pre-flight gate for login endpoints.
    ///
    /// Keys on [`InboundRequest::client_address`]. Requests from a locked
    /// address are refused with a message stating the minutes remaining.
    pub async fn check_request(&self, request: &InboundRequest) -> Result<RateLimitDecision, Error> {
        let address = request.client_address();
        let status = self.check_login_status(address).await?;

        if !status.is_locked {
            return Ok(RateLimitDecision::Allowed);
        }

        let minutes_remaining = status.minutes_remaining(self.clock.now()).unwrap_or(0);
        tracing::info!(
            address = %address,
            minutes_remaining,
            "Refused login from locked client address"
        );

        Ok(RateLimitDecision::Limited {
            message: lockout_message(minutes_remaining),
            minutes_remaining,
            status,
        })
    }

    /// Delete records that no longer influence any decision.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = self.clock.now();
        self.repository
            .purge(&|record| self.is_dead(record, now))
            .await
    }

    /// Start the background cleanup task.
    ///
    /// This spawns a task that periodically purges expired lockouts and stale
    /// windows so the in-memory map does not grow without bound. Active
    /// lockouts are never touched.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    ///
    /// # Returns
    ///
    /// A `JoinHandle` for the spawned task.
    pub fn start_cleanup_task(
        self: &Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        let interval = self
            .config
            .cleanup_interval
            .max(std::time::Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match service.purge_expired().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(
                                    count = count,
                                    "Purged expired login attempt records"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "Failed to purge login attempt records"
                                );
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login attempt cleanup task");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, repositories::InMemoryLoginAttemptRepository};
    use chrono::Duration;

    const ADDR: &str = "1.2.3.4";

    fn limiter_with(
        config: LoginLimiterConfig,
    ) -> (
        LoginLimiterService<InMemoryLoginAttemptRepository>,
        Arc<ManualClock>,
    ) {
        let clock = Arc::new(ManualClock::starting_now());
        let repo = Arc::new(InMemoryLoginAttemptRepository::new());
        (LoginLimiterService::new(repo, config, clock.clone()), clock)
    }

    fn limiter() -> (
        LoginLimiterService<InMemoryLoginAttemptRepository>,
        Arc<ManualClock>,
    ) {
        limiter_with(LoginLimiterConfig::default())
    }

    async fn lock(limiter: &LoginLimiterService<InMemoryLoginAttemptRepository>) -> LoginStatus {
        let mut status = None;
        for _ in 0..5 {
            status = Some(limiter.record_failed_attempt(ADDR).await.unwrap());
        }
        status.unwrap()
    }

    #[tokio::test]
    async fn test_unknown_address_is_fresh() {
        let (limiter, _) = limiter();
        let status = limiter.check_login_status(ADDR).await.unwrap();
        assert_eq!(status, LoginStatus::unlocked(5));
    }

    #[tokio::test]
    async fn test_countdown_then_lockout() {
        let (limiter, clock) = limiter();

        for expected in [4, 3, 2, 1] {
            let status = limiter.record_failed_attempt(ADDR).await.unwrap();
            assert!(!status.is_locked);
            assert_eq!(status.remaining_attempts, expected);
            assert!(status.locked_until.is_none());
        }

        let status = limiter.record_failed_attempt(ADDR).await.unwrap();
        assert!(status.is_locked);
        assert_eq!(status.remaining_attempts, 0);
        assert_eq!(
            status.locked_until,
            Some(clock.now() + Duration::minutes(15))
        );
    }

    #[tokio::test]
    async fn test_lockout_is_not_extended() {
        let (limiter, clock) = limiter();
        let locked = lock(&limiter).await;

        clock.advance(Duration::minutes(5));
        let again = limiter.record_failed_attempt(ADDR).await.unwrap();
        assert!(again.is_locked);
        assert_eq!(again.remaining_attempts, 0);
        assert_eq!(again.locked_until, locked.locked_until);

        let record = limiter.repository().get(ADDR).await.unwrap().unwrap();
        assert_eq!(record.attempts, 5);
    }

    #[tokio::test]
    async fn test_still_locked_at_exact_expiry() {
        let (limiter, clock) = limiter();
        lock(&limiter).await;

        clock.advance(Duration::minutes(15));
        assert!(limiter.is_locked(ADDR).await.unwrap());

        clock.advance(Duration::milliseconds(1));
        assert!(!limiter.is_locked(ADDR).await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (limiter, _) = limiter();
        limiter.record_failed_attempt(ADDR).await.unwrap();
        limiter.record_failed_attempt(ADDR).await.unwrap();

        limiter.reset_login_attempts(ADDR).await.unwrap();

        let status = limiter.check_login_status(ADDR).await.unwrap();
        assert_eq!(status, LoginStatus::unlocked(5));
        assert!(limiter.repository().get(ADDR).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_unknown_address_is_ok() {
        let (limiter, _) = limiter();
        limiter.reset_login_attempts("never-seen").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lockout_purged_by_check() {
        let (limiter, clock) = limiter();
        lock(&limiter).await;

        clock.advance(Duration::minutes(16));
        let status = limiter.check_login_status(ADDR).await.unwrap();
        assert_eq!(status, LoginStatus::unlocked(5));
        assert!(limiter.repository().get(ADDR).await.unwrap().is_none());

        let status = limiter.record_failed_attempt(ADDR).await.unwrap();
        assert_eq!(status.remaining_attempts, 4);
    }

    #[tokio::test]
    async fn test_expired_lockout_restarts_on_failure() {
        let (limiter, clock) = limiter();
        lock(&limiter).await;

        clock.advance(Duration::minutes(16));
        let status = limiter.record_failed_attempt(ADDR).await.unwrap();
        assert!(!status.is_locked);
        assert_eq!(status.remaining_attempts, 4);

        let record = limiter.repository().get(ADDR).await.unwrap().unwrap();
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn test_inactivity_window_resets_to_one() {
        let (limiter, clock) = limiter();
        for _ in 0..3 {
            limiter.record_failed_attempt(ADDR).await.unwrap();
        }

        clock.advance(Duration::minutes(61));
        let status = limiter.record_failed_attempt(ADDR).await.unwrap();
        assert_eq!(status.remaining_attempts, 4);
        let record = limiter.repository().get(ADDR).await.unwrap().unwrap();
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn test_check_leaves_idle_window_untouched() {
        let (limiter, clock) = limiter();
        for _ in 0..3 {
            limiter.record_failed_attempt(ADDR).await.unwrap();
        }

        clock.advance(Duration::minutes(61));
        let status = limiter.check_login_status(ADDR).await.unwrap();
        assert_eq!(status, LoginStatus::unlocked(2));
        let record = limiter.repository().get(ADDR).await.unwrap().unwrap();
        assert_eq!(record.attempts, 3);
    }

    #[tokio::test]
    async fn test_window_boundary_keeps_counting() {
        let (limiter, clock) = limiter();
        limiter.record_failed_attempt(ADDR).await.unwrap();

        clock.advance(Duration::minutes(60));
        let status = limiter.record_failed_attempt(ADDR).await.unwrap();
        assert_eq!(status.remaining_attempts, 3);
    }

    #[tokio::test]
    async fn test_addresses_tracked_separately() {
        let (limiter, _) = limiter();
        lock(&limiter).await;

        let other = limiter.check_login_status("5.6.7.8").await.unwrap();
        assert!(!other.is_locked);
        assert_eq!(other.remaining_attempts, 5);
        assert!(limiter.is_locked(ADDR).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_limiter_never_records() {
        let (limiter, _) = limiter_with(LoginLimiterConfig::disabled());
        for _ in 0..10 {
            let status = limiter.record_failed_attempt(ADDR).await.unwrap();
            assert!(!status.is_locked);
        }
        assert_eq!(limiter.repository().len().await.unwrap(), 0);
        assert!(!limiter.is_enabled());
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let (limiter, _) = limiter_with(LoginLimiterConfig {
            max_failed_attempts: 2,
            ..Default::default()
        });
        assert_eq!(
            limiter.record_failed_attempt(ADDR).await.unwrap().remaining_attempts,
            1
        );
        assert!(limiter.record_failed_attempt(ADDR).await.unwrap().is_locked);
    }

    #[tokio::test]
    async fn test_check_request_uses_forwarded_address() {
        let (limiter, _) = limiter();
        lock(&limiter).await;

        let locked = InboundRequest::new("POST").with_header("x-forwarded-for", ADDR);
        match limiter.check_request(&locked).await.unwrap() {
            RateLimitDecision::Limited {
                message,
                minutes_remaining,
                status,
            } => {
                assert_eq!(minutes_remaining, 15);
                assert_eq!(
                    message,
                    "Too many failed login attempts. Please try again in 15 minutes."
                );
                assert!(status.is_locked);
            }
            RateLimitDecision::Allowed => panic!("expected lockout"),
        }

        let other = InboundRequest::new("POST").with_header("x-forwarded-for", "9.9.9.9");
        assert!(limiter.check_request(&other).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_missing_header_shares_unknown_bucket() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter
                .record_failed_attempt(crate::request::UNKNOWN_CLIENT_ADDRESS)
                .await
                .unwrap();
        }
        let anonymous = InboundRequest::new("POST");
        assert!(!limiter.check_request(&anonymous).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_purge_keeps_active_lockouts() {
        let (limiter, clock) = limiter();
        lock(&limiter).await;
        limiter.record_failed_attempt("stale").await.unwrap();

        clock.advance(Duration::minutes(10));
        limiter.record_failed_attempt("recent").await.unwrap();
        clock.advance(Duration::minutes(55));

        // "stale" idle 65 min; "recent" idle 55 min; ADDR lockout expired
        let removed = limiter.purge_expired().await.unwrap();
        assert_eq!(removed, 2);
        assert!(limiter.repository().get("recent").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_reach_lockout() {
        let (limiter, _) = limiter();
        let limiter = Arc::new(limiter);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.record_failed_attempt(ADDR).await.unwrap()
            }));
        }
        let mut locked_results = 0;
        for handle in handles {
            if handle.await.unwrap().is_locked {
                locked_results += 1;
            }
        }

        // Exactly 4 failures saw an unlocked record; the rest were locked
        assert_eq!(locked_results, 16);
        let record = limiter.repository().get(ADDR).await.unwrap().unwrap();
        assert_eq!(record.attempts, 5);
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let (limiter, _) = limiter_with(LoginLimiterConfig {
            cleanup_interval: std::time::Duration::from_millis(10),
            ..Default::default()
        });
        let limiter = Arc::new(limiter);
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = limiter.start_cleanup_task(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("cleanup task should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_unvalidated_lockout_duration_saturates() {
        let (limiter, _) = limiter_with(LoginLimiterConfig {
            lockout_duration: Duration::MAX,
            ..Default::default()
        });

        let status = lock(&limiter).await;
        assert!(status.is_locked);
        assert_eq!(status.locked_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(limiter.is_locked(ADDR).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_task_survives_zero_interval() {
        let (limiter, _) = limiter_with(LoginLimiterConfig {
            cleanup_interval: std::time::Duration::ZERO,
            ..Default::default()
        });
        let limiter = Arc::new(limiter);
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = limiter.start_cleanup_task(rx);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("cleanup task should stop")
            .expect("cleanup task should not panic");
    }
}
