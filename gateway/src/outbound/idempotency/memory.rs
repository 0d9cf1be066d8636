//! In-memory idempotency store.
//!
//! Single-process stand-in for the Redis adapter, used by tests and by
//! deployments without a configured Redis URL. Entries expire lazily: an
//! entry whose deadline has passed is dropped on the next access, so the
//! TTL boundary matches the shared-store semantics (an entry is live
//! strictly before its deadline and absent from the deadline onward).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::idempotency::{IdempotencyKey, IdempotencyLookupResult, IdempotencyRecord};
use crate::domain::ports::{IdempotencyStore, IdempotencyStoreError};

#[derive(Debug, Clone)]
enum Entry {
    InFlight { expires_at: Instant },
    Completed {
        record: IdempotencyRecord,
        expires_at: Instant,
    },
}

impl Entry {
    fn expires_at(&self) -> Instant {
        match self {
            Self::InFlight { expires_at } | Self::Completed { expires_at, .. } => *expires_at,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at()
    }
}

/// Process-local [`IdempotencyStore`] backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryIdempotencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, IdempotencyStoreError> {
        self.entries
            .lock()
            .map_err(|_| IdempotencyStoreError::query("idempotency store mutex poisoned"))
    }

    fn deadline(ttl: Duration) -> Instant {
        Instant::now().checked_add(ttl).unwrap_or_else(Instant::now)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<IdempotencyLookupResult, IdempotencyStoreError> {
        let mut entries = self.entries()?;
        let storage_key = key.storage_key();
        let now = Instant::now();
        match entries.get(&storage_key) {
            Some(entry) if entry.is_live(now) => match entry {
                Entry::InFlight { .. } => Ok(IdempotencyLookupResult::InFlight),
                Entry::Completed { record, .. } => {
                    Ok(IdempotencyLookupResult::Completed(record.clone()))
                }
            },
            Some(_) => {
                entries.remove(&storage_key);
                Ok(IdempotencyLookupResult::Miss)
            }
            None => Ok(IdempotencyLookupResult::Miss),
        }
    }

    async fn reserve(
        &self,
        key: &IdempotencyKey,
        ttl: Duration,
    ) -> Result<bool, IdempotencyStoreError> {
        let mut entries = self.entries()?;
        let storage_key = key.storage_key();
        let now = Instant::now();
        if entries
            .get(&storage_key)
            .is_some_and(|entry| entry.is_live(now))
        {
            return Ok(false);
        }
        entries.insert(
            storage_key,
            Entry::InFlight {
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(true)
    }

    async fn complete(
        &self,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<(), IdempotencyStoreError> {
        let mut entries = self.entries()?;
        entries.insert(
            record.key().storage_key(),
            Entry::Completed {
                record: record.clone(),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError> {
        let mut entries = self.entries()?;
        // Only clear in-flight markers; a completed record must survive a
        // late release from a racing caller.
        if let Some(Entry::InFlight { .. }) = entries.get(&key.storage_key()) {
            entries.remove(&key.storage_key());
        }
        Ok(())
    }
}
