//! Idempotency store adapters.

mod memory;
mod redis;

pub use memory::InMemoryIdempotencyStore;
pub use redis::RedisIdempotencyStore;
