//! Environment-driven configuration for idempotency behaviour.

use std::time::Duration;

/// Environment variable controlling record retention, in hours.
pub const IDEMPOTENCY_TTL_HOURS_ENV: &str = "IDEMPOTENCY_TTL_HOURS";

/// Environment variable controlling the in-flight reservation window, in
/// seconds.
pub const IDEMPOTENCY_RESERVATION_SECONDS_ENV: &str = "IDEMPOTENCY_RESERVATION_SECONDS";

/// Environment abstraction for configuration lookups.
///
/// Allows testing with fake environments without mutating process state.
pub trait IdempotencyEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultIdempotencyEnv;

impl DefaultIdempotencyEnv {
    /// Create a new environment reader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdempotencyEnv for DefaultIdempotencyEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Configuration for idempotency behaviour.
///
/// `ttl` is the retention window for completed records: within it, a retry
/// replays the stored response; once it has fully elapsed the key is
/// treated as new. `reservation_ttl` bounds the in-flight marker placed
/// while a first attempt executes, so a crashed server cannot wedge a key
/// forever.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    ttl: Duration,
    reservation_ttl: Duration,
}

impl IdempotencyConfig {
    const DEFAULT_TTL_HOURS: u64 = 24;

    /// Prevents records expiring before a client can reasonably retry.
    const MIN_TTL_HOURS: u64 = 1;

    /// Upper bound of ten years prevents unbounded store growth.
    const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

    const DEFAULT_RESERVATION_SECONDS: u64 = 30;
    const MIN_RESERVATION_SECONDS: u64 = 1;
    const MAX_RESERVATION_SECONDS: u64 = 3600;

    /// Load configuration from the real process environment.
    ///
    /// Reads `IDEMPOTENCY_TTL_HOURS` (default 24, clamped to [1, 87600])
    /// and `IDEMPOTENCY_RESERVATION_SECONDS` (default 30, clamped to
    /// [1, 3600]). Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_env_with(&DefaultIdempotencyEnv)
    }

    /// Load configuration from a custom environment source.
    pub fn from_env_with(env: &impl IdempotencyEnv) -> Self {
        let ttl_hours = read_clamped(
            env,
            IDEMPOTENCY_TTL_HOURS_ENV,
            Self::DEFAULT_TTL_HOURS,
            Self::MIN_TTL_HOURS,
            Self::MAX_TTL_HOURS,
        );
        let reservation_seconds = read_clamped(
            env,
            IDEMPOTENCY_RESERVATION_SECONDS_ENV,
            Self::DEFAULT_RESERVATION_SECONDS,
            Self::MIN_RESERVATION_SECONDS,
            Self::MAX_RESERVATION_SECONDS,
        );
        Self {
            ttl: Duration::from_secs(ttl_hours.saturating_mul(3600)),
            reservation_ttl: Duration::from_secs(reservation_seconds),
        }
    }

    /// Create with explicit windows (for testing).
    pub fn with_ttls(ttl: Duration, reservation_ttl: Duration) -> Self {
        Self {
            ttl,
            reservation_ttl,
        }
    }

    /// Retention window for completed records.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lifetime of the in-flight reservation marker.
    pub fn reservation_ttl(&self) -> Duration {
        self.reservation_ttl
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(Self::DEFAULT_TTL_HOURS * 3600),
            reservation_ttl: Duration::from_secs(Self::DEFAULT_RESERVATION_SECONDS),
        }
    }
}

fn read_clamped(env: &impl IdempotencyEnv, name: &str, default: u64, min: u64, max: u64) -> u64 {
    env.string(name)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeEnv(HashMap<&'static str, &'static str>);

    impl IdempotencyEnv for FakeEnv {
        fn string(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|v| (*v).to_owned())
        }
    }

    fn env(pairs: &[(&'static str, &'static str)]) -> FakeEnv {
        FakeEnv(pairs.iter().copied().collect())
    }

    #[test]
    fn defaults_to_24_hours_and_30_seconds() {
        let config = IdempotencyConfig::from_env_with(&env(&[]));
        assert_eq!(config.ttl(), Duration::from_secs(24 * 3600));
        assert_eq!(config.reservation_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn reads_overrides() {
        let config = IdempotencyConfig::from_env_with(&env(&[
            (IDEMPOTENCY_TTL_HOURS_ENV, "12"),
            (IDEMPOTENCY_RESERVATION_SECONDS_ENV, "5"),
        ]));
        assert_eq!(config.ttl(), Duration::from_secs(12 * 3600));
        assert_eq!(config.reservation_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn clamps_pathological_values() {
        let config = IdempotencyConfig::from_env_with(&env(&[
            (IDEMPOTENCY_TTL_HOURS_ENV, "0"),
            (IDEMPOTENCY_RESERVATION_SECONDS_ENV, "999999"),
        ]));
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.reservation_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn ignores_unparseable_values() {
        let config =
            IdempotencyConfig::from_env_with(&env(&[(IDEMPOTENCY_TTL_HOURS_ENV, "soon")]));
        assert_eq!(config.ttl(), Duration::from_secs(24 * 3600));
    }
}
