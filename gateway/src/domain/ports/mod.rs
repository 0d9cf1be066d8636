//! Domain port traits implemented by outbound adapters.

mod idempotency_store;

pub use idempotency_store::{IdempotencyStore, IdempotencyStoreError};

#[cfg(test)]
pub use idempotency_store::MockIdempotencyStore;
