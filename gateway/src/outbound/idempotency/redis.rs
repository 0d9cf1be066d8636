//! Redis-backed idempotency store.
//!
//! Entries live under `idempotency:<key>` as a JSON envelope tagged with
//! the entry state. Reservation relies on `SET NX EX`, which is atomic on
//! the Redis side and therefore safe across gateway instances; expiry is
//! enforced by Redis key TTLs, so an entry disappears once its retention
//! window has fully elapsed.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::{RedisConnectionManager, redis};
use serde::{Deserialize, Serialize};

use crate::domain::idempotency::{IdempotencyKey, IdempotencyLookupResult, IdempotencyRecord};
use crate::domain::ports::{IdempotencyStore, IdempotencyStoreError};

/// Wire envelope for entries in Redis.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum StoredEntry {
    /// First attempt currently executing somewhere.
    InFlight,
    /// Completed response ready to replay.
    Completed { record: IdempotencyRecord },
}

/// Shared [`IdempotencyStore`] backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    pool: Pool<RedisConnectionManager>,
}

impl RedisIdempotencyStore {
    /// Connect to Redis and build the connection pool.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the URL is malformed or the pool
    /// cannot reach the server.
    pub async fn connect(url: &str) -> Result<Self, IdempotencyStoreError> {
        let manager = RedisConnectionManager::new(url)
            .map_err(|err| IdempotencyStoreError::connection(err.to_string()))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|err| IdempotencyStoreError::connection(err.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, IdempotencyStoreError> {
        self.pool
            .get()
            .await
            .map_err(|err| IdempotencyStoreError::connection(err.to_string()))
    }

    fn encode(entry: &StoredEntry) -> Result<String, IdempotencyStoreError> {
        serde_json::to_string(entry)
            .map_err(|err| IdempotencyStoreError::serialization(err.to_string()))
    }

    fn decode(raw: &str) -> Result<StoredEntry, IdempotencyStoreError> {
        serde_json::from_str(raw)
            .map_err(|err| IdempotencyStoreError::serialization(err.to_string()))
    }

    /// Redis EX takes whole seconds; never send zero, which is an error.
    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<IdempotencyLookupResult, IdempotencyStoreError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(key.storage_key())
            .query_async(&mut *conn)
            .await
            .map_err(|err| IdempotencyStoreError::query(err.to_string()))?;
        match raw {
            None => Ok(IdempotencyLookupResult::Miss),
            Some(raw) => match Self::decode(&raw)? {
                StoredEntry::InFlight => Ok(IdempotencyLookupResult::InFlight),
                StoredEntry::Completed { record } => {
                    Ok(IdempotencyLookupResult::Completed(record))
                }
            },
        }
    }

    async fn reserve(
        &self,
        key: &IdempotencyKey,
        ttl: Duration,
    ) -> Result<bool, IdempotencyStoreError> {
        let payload = Self::encode(&StoredEntry::InFlight)?;
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key.storage_key())
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut *conn)
            .await
            .map_err(|err| IdempotencyStoreError::query(err.to_string()))?;
        Ok(reply.is_some())
    }

    async fn complete(
        &self,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<(), IdempotencyStoreError> {
        let payload = Self::encode(&StoredEntry::Completed {
            record: record.clone(),
        })?;
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(record.key().storage_key())
            .arg(payload)
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut *conn)
            .await
            .map_err(|err| IdempotencyStoreError::query(err.to_string()))?;
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError> {
        let mut conn = self.conn().await?;
        // Only the reservation owner releases, and only before completing,
        // so an unconditional delete cannot drop another attempt's record.
        let _: i64 = redis::cmd("DEL")
            .arg(key.storage_key())
            .query_async(&mut *conn)
            .await
            .map_err(|err| IdempotencyStoreError::query(err.to_string()))?;
        Ok(())
    }
}
