//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use tracing::warn;

use crate::domain::idempotency::{DefaultIdempotencyEnv, IdempotencyConfig, IdempotencyEnv};

/// Environment variable naming the socket address to bind.
pub const BIND_ADDR_ENV: &str = "GATEWAY_BIND_ADDR";

/// Environment variable naming the Redis connection URL.
///
/// When unset, the gateway falls back to the in-memory idempotency store;
/// replay then only works within a single process.
pub const REDIS_URL_ENV: &str = "GATEWAY_REDIS_URL";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Runtime configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) redis_url: Option<String>,
    pub(crate) idempotency: IdempotencyConfig,
}

impl ServerConfig {
    /// Load configuration from the real process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(&DefaultIdempotencyEnv)
    }

    /// Load configuration from a custom environment source.
    ///
    /// An unparseable bind address falls back to the default rather than
    /// refusing to start.
    pub fn from_env_with(env: &impl IdempotencyEnv) -> Self {
        let bind_addr = env
            .string(BIND_ADDR_ENV)
            .and_then(|raw| match raw.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(err) => {
                    warn!(value = %raw, error = %err, "invalid bind address, using default");
                    None
                }
            })
            .unwrap_or_else(default_bind_addr);
        let redis_url = env.string(REDIS_URL_ENV).filter(|url| !url.is_empty());
        Self {
            bind_addr,
            redis_url,
            idempotency: IdempotencyConfig::from_env_with(env),
        }
    }

    /// The socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// The configured Redis URL, if any.
    #[must_use]
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref()
    }

    /// Idempotency retention and reservation windows.
    #[must_use]
    pub fn idempotency(&self) -> &IdempotencyConfig {
        &self.idempotency
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            redis_url: None,
            idempotency: IdempotencyConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    match DEFAULT_BIND_ADDR.parse() {
        Ok(addr) => addr,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], 8080)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::domain::idempotency::IDEMPOTENCY_TTL_HOURS_ENV;

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
    fn defaults_apply_without_environment() {
        let config = ServerConfig::from_env_with(&env(&[]));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.redis_url(), None);
        assert_eq!(config.idempotency().ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn reads_bind_address_and_redis_url() {
        let config = ServerConfig::from_env_with(&env(&[
            (BIND_ADDR_ENV, "127.0.0.1:9090"),
            (REDIS_URL_ENV, "redis://cache:6379"),
            (IDEMPOTENCY_TTL_HOURS_ENV, "12"),
        ]));
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.redis_url(), Some("redis://cache:6379"));
        assert_eq!(config.idempotency().ttl(), Duration::from_secs(12 * 3600));
    }

    #[test]
    fn invalid_bind_address_falls_back_to_default() {
        let config = ServerConfig::from_env_with(&env(&[(BIND_ADDR_ENV, "not-an-addr")]));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn empty_redis_url_counts_as_unset() {
        let config = ServerConfig::from_env_with(&env(&[(REDIS_URL_ENV, "")]));
        assert_eq!(config.redis_url(), None);
    }
}
