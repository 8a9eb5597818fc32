//! Repository trait for login attempt tracking.
//!
//! This module defines the keyed-store interface the login limiter uses to
//! keep one [`LoginAttemptRecord`] per client address.

use async_trait::async_trait;

use crate::{Error, storage::LoginAttemptRecord};

/// Transition applied to the record for one address.
///
/// Receives the current record (if any) and returns the record to store, or
/// `None` to delete it.
pub type RecordUpdate<'a> =
    &'a (dyn Fn(Option<&LoginAttemptRecord>) -> Option<LoginAttemptRecord> + Send + Sync);

/// Predicate selecting records that [`LoginAttemptRepository::purge`] removes.
pub type RecordFilter<'a> = &'a (dyn Fn(&LoginAttemptRecord) -> bool + Send + Sync);

/// Keyed storage for login attempt records.
///
/// # Concurrency
///
/// Two failed logins from the same address can race. [`update`] must apply
/// its transition atomically with respect to other calls for the same key so
/// that no failure is lost; the limiter never does a separate get-then-set.
///
/// [`update`]: LoginAttemptRepository::update
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Fetch the record for an address.
    async fn get(&self, address: &str) -> Result<Option<LoginAttemptRecord>, Error>;

    /// Atomically replace the record for an address.
    ///
    /// # Returns
    ///
    /// The record stored after the transition, or `None` if it was deleted or
    /// never created.
    async fn update(
        &self,
        address: &str,
        update: RecordUpdate<'_>,
    ) -> Result<Option<LoginAttemptRecord>, Error>;

    /// Delete the record for an address.
    ///
    /// # Returns
    ///
    /// `true` if a record existed.
    async fn remove(&self, address: &str) -> Result<bool, Error>;

    /// Delete every record matching `is_dead`.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn purge(&self, is_dead: RecordFilter<'_>) -> Result<u64, Error>;

    /// Number of tracked addresses.
    async fn len(&self) -> Result<usize, Error>;
}
