//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Adapters are thin translators between domain types and
//! infrastructure-specific representations; they contain no business
//! logic. The idempotency store has a Redis adapter for production and an
//! in-memory adapter for tests and Redis-less development.

pub mod idempotency;
