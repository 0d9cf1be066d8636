//! Server construction and middleware wiring.

mod config;

pub use config::{BIND_ADDR_ENV, REDIS_URL_ENV, ServerConfig};

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::{info, warn};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::domain::access::{AccessPolicy, MembershipRole};
use crate::domain::ports::IdempotencyStore;
use crate::inbound::http;
use crate::inbound::http::health::HealthState;
use crate::inbound::http::plans::PlanRegistry;
use crate::middleware::{Idempotency, ProblemJson, RequestTrace};
use crate::outbound::idempotency::{InMemoryIdempotencyStore, RedisIdempotencyStore};

/// The access policy the gateway ships with.
///
/// Only plan creation is guarded; reads stay open so dashboards and
/// anonymous previews keep working.
pub fn default_policy() -> AccessPolicy {
    AccessPolicy::new().require(
        "POST",
        "/api/v1/plans",
        &[
            MembershipRole::Owner,
            MembershipRole::Admin,
            MembershipRole::Planner,
        ],
    )
}

/// Pick the idempotency store backend from configuration.
///
/// A configured Redis URL that cannot be reached is a startup failure; a
/// missing URL falls back to the in-memory store, which only supports a
/// single gateway instance.
async fn build_store(config: &ServerConfig) -> std::io::Result<Arc<dyn IdempotencyStore>> {
    match config.redis_url() {
        Some(url) => {
            let store = RedisIdempotencyStore::connect(url)
                .await
                .map_err(|err| std::io::Error::other(err.to_string()))?;
            info!("using redis idempotency store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no redis url configured, using in-memory idempotency store");
            Ok(Arc::new(InMemoryIdempotencyStore::new()))
        }
    }
}

/// Start the gateway and serve until shutdown.
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let store = build_store(&config).await?;
    let idempotency = config.idempotency().clone();

    let health_state = web::Data::new(HealthState::new());
    let policy = web::Data::new(default_policy());
    let registry = web::Data::new(PlanRegistry::new());

    // Clone for the server factory so the readiness probe stays accessible.
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(server_health_state.clone())
            .app_data(policy.clone())
            .app_data(registry.clone())
            .configure(http::configure)
            .wrap(Idempotency::new(Arc::clone(&store), idempotency.clone()))
            .wrap(ProblemJson)
            .wrap(RequestTrace);

        #[cfg(debug_assertions)]
        let app =
            app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

        app
    })
    .bind(config.bind_addr())?;

    health_state.mark_ready();
    info!(addr = %config.bind_addr(), "gateway listening");
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_guards_plan_creation() {
        let policy = default_policy();
        assert!(
            policy
                .authorize("POST", "/api/v1/plans", &[MembershipRole::Planner])
                .is_ok()
        );
        assert!(
            policy
                .authorize("POST", "/api/v1/plans", &[MembershipRole::Viewer])
                .is_err()
        );
        assert!(policy.authorize("GET", "/api/v1/plans", &[]).is_ok());
    }

    #[tokio::test]
    async fn falls_back_to_memory_store_without_redis() {
        let config = ServerConfig::default();
        let store = build_store(&config).await.expect("memory store");
        let key = crate::domain::idempotency::IdempotencyKey::random();
        assert!(
            store
                .reserve(&key, std::time::Duration::from_secs(1))
                .await
                .expect("reserve on memory store")
        );
    }
}
