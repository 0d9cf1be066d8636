//! Idempotency primitives for safe request retries.
//!
//! Every state-mutating request must carry an `Idempotency-Key` header.
//! The gateway fingerprints the request payload, executes the handler at
//! most once per key, and replays the recorded response to retries within
//! the retention window. Types here are shared between the interceptor
//! middleware and the store adapters:
//!
//! - [`IdempotencyKey`]: validated opaque token from the header.
//! - [`PayloadHash`]: SHA-256 fingerprint of the canonicalized payload,
//!   used to detect key reuse with a different body.
//! - [`IdempotencyRecord`]: captured response replayed on retry.
//! - [`IdempotencyLookupResult`]: outcome of a store lookup.
//! - [`IdempotencyConfig`]: retention and reservation windows.

mod config;
mod key;
mod payload;
mod record;

pub use config::{
    DefaultIdempotencyEnv, IDEMPOTENCY_RESERVATION_SECONDS_ENV, IDEMPOTENCY_TTL_HOURS_ENV,
    IdempotencyConfig, IdempotencyEnv,
};
pub use key::{
    IdempotencyKey, IdempotencyKeyValidationError, MAX_KEY_LENGTH, STORAGE_KEY_PREFIX,
};
pub use payload::{PayloadHash, PayloadHashDecodeError, hash_request_payload};
pub use record::{IdempotencyLookupResult, IdempotencyRecord};
