//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI specification for
//! the REST API: plan endpoints, health probes, and the problem-detail
//! error schema. Swagger UI serves the document in debug builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::ProblemDetail;
use crate::inbound::http::plans::{CreatePlanRequest, Plan};

/// Enrich the generated document with the membership-roles header scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "MembershipRoles",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-Membership-Roles",
                "Comma-separated membership roles resolved by the identity proxy.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Urban planner gateway API",
        description = "HTTP interface for idempotent plan mutations and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::plans::create_plan,
        crate::inbound::http::plans::list_plans,
        crate::inbound::http::plans::get_plan,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(Plan, CreatePlanRequest, ProblemDetail)),
    tags(
        (name = "plans", description = "Operations on urban plans"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
