//! Domain primitives for the idempotent mutation pipeline.
//!
//! Types here are transport agnostic. Inbound adapters and middleware map
//! them onto HTTP requests and problem-detail responses.

pub mod access;
pub mod error;
pub mod idempotency;
pub mod ports;
pub mod problem;

pub use self::access::{AccessPolicy, MembershipRole, ParseMembershipRoleError};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::idempotency::{
    IdempotencyConfig, IdempotencyKey, IdempotencyKeyValidationError, IdempotencyLookupResult,
    IdempotencyRecord, PayloadHash, hash_request_payload,
};
pub use self::problem::{GENERAL_ERRORS_KEY, ProblemDetail, group_violations};

/// Convenient result alias for HTTP handlers returning domain errors.
pub type ApiResult<T> = Result<T, Error>;
