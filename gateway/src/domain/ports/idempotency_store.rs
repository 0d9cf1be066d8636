//! Port abstraction for the shared idempotency store.
//!
//! The [`IdempotencyStore`] trait is the contract between the interceptor
//! middleware and whatever key-value store backs it. Adapters translate
//! these operations onto Redis (shared across gateway instances) or onto
//! process memory (tests and Redis-less development).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::idempotency::{IdempotencyKey, IdempotencyLookupResult, IdempotencyRecord};

/// Errors raised by idempotency store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdempotencyStoreError {
    /// Store connection could not be established.
    #[error("idempotency store connection failed: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },
    /// A read or write failed during execution.
    #[error("idempotency store query failed: {message}")]
    Query {
        /// Description of the query failure.
        message: String,
    },
    /// A stored entry could not be encoded or decoded.
    #[error("idempotency store serialization failed: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl IdempotencyStoreError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a serialization error with the given message.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Port for idempotency entry storage.
///
/// The store is shared by every gateway instance, so entry lifecycles must
/// be enforced store-side:
///
/// - [`reserve`](IdempotencyStore::reserve) is an atomic set-if-absent; it
///   is the only defence against two concurrent first attempts with the
///   same key, so adapters must not implement it as a read-then-write.
/// - Expiry is exclusive: an entry whose TTL has fully elapsed is reported
///   as [`IdempotencyLookupResult::Miss`]. A retry arriving at or after
///   expiry executes business logic afresh.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Look up the live entry for a key.
    async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<IdempotencyLookupResult, IdempotencyStoreError>;

    /// Atomically claim a key for an in-flight first attempt.
    ///
    /// Returns `false` when a live entry (marker or record) already exists;
    /// the caller lost the race and must not execute business logic.
    async fn reserve(
        &self,
        key: &IdempotencyKey,
        ttl: Duration,
    ) -> Result<bool, IdempotencyStoreError>;

    /// Persist a completed response, replacing the in-flight marker.
    async fn complete(
        &self,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<(), IdempotencyStoreError>;

    /// Drop the entry for a key after a failed attempt.
    ///
    /// Only the reservation owner calls this, so the same key can be
    /// retried immediately. Never cache failures.
    ///
    /// Adapters delete unconditionally: a first attempt that outlives its
    /// reservation TTL can remove a successor's marker or record, so
    /// handlers must finish well within the reservation window. Closing
    /// that window entirely would require an owner token compared on
    /// delete.
    async fn release(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError>;
}
