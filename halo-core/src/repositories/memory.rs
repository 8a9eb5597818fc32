//! Process-local login attempt store.

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Error,
    repositories::login_attempt::{LoginAttemptRepository, RecordFilter, RecordUpdate},
    storage::LoginAttemptRecord,
};

/// In-memory [`LoginAttemptRepository`] backed by a [`DashMap`].
///
/// `update` runs its transition while holding the shard write lock for the
/// key, so concurrent failures for one address serialise. State is lost on
/// restart and is not shared between processes.
#[derive(Debug, Default)]
pub struct InMemoryLoginAttemptRepository {
    records: DashMap<String, LoginAttemptRecord>,
}

impl InMemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
    async fn get(&self, address: &str) -> Result<Option<LoginAttemptRecord>, Error> {
        Ok(self.records.get(address).map(|record| record.clone()))
    }

    async fn update(
        &self,
        address: &str,
        update: RecordUpdate<'_>,
    ) -> Result<Option<LoginAttemptRecord>, Error> {
        let stored = match self.records.entry(address.to_string()) {
            Entry::Occupied(mut entry) => match update(Some(entry.get())) {
                Some(next) => {
                    entry.insert(next.clone());
                    Some(next)
                }
                None => {
                    entry.remove();
                    None
                }
            },
            Entry::Vacant(entry) => match update(None) {
                Some(next) => {
                    entry.insert(next.clone());
                    Some(next)
                }
                None => None,
            },
        };
        Ok(stored)
    }

    async fn remove(&self, address: &str) -> Result<bool, Error> {
        Ok(self.records.remove(address).is_some())
    }

    async fn purge(&self, is_dead: RecordFilter<'_>) -> Result<u64, Error> {
        let mut removed = 0u64;
        self.records.retain(|_, record| {
            let dead = is_dead(record);
            if dead {
                removed += 1;
            }
            !dead
        });
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.records.len())
    }
}
