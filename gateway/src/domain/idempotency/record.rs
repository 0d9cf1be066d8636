//! Stored idempotency records and lookup outcomes.

use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IdempotencyKey, PayloadHash};

/// Snapshot of a successfully completed mutation, replayed on retry.
///
/// The response body is kept as the raw UTF-8 bytes the handler produced so
/// a replay is byte-identical to the original response; re-parsing and
/// re-serializing JSON could reorder object keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    key: IdempotencyKey,
    payload_hash: PayloadHash,
    status: u16,
    content_type: Option<String>,
    body: String,
    created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Capture a completed response under the given key.
    pub fn new(
        key: IdempotencyKey,
        payload_hash: PayloadHash,
        status: StatusCode,
        content_type: Option<String>,
        body: String,
    ) -> Self {
        Self {
            key,
            payload_hash,
            status: status.as_u16(),
            content_type,
            body,
            created_at: Utc::now(),
        }
    }

    /// The idempotency key this record belongs to.
    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    /// Fingerprint of the request payload that produced this response.
    pub fn payload_hash(&self) -> &PayloadHash {
        &self.payload_hash
    }

    /// Original response status.
    ///
    /// Records are only created for 2xx responses, but a record read back
    /// from an external store is not trusted blindly; an out-of-range code
    /// falls back to 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Original `Content-Type` header, when one was present.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw response body to replay verbatim.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// When the record was captured.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Outcome of looking up an idempotency key in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyLookupResult {
    /// No live entry exists for this key.
    Miss,
    /// A first attempt with this key is currently executing.
    InFlight,
    /// A prior attempt completed successfully; replay its response.
    Completed(IdempotencyRecord),
}
