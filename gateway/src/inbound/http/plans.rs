//! Plans API handlers.
//!
//! ```text
//! POST /api/v1/plans          Create an urban plan
//! GET  /api/v1/plans          List plans
//! GET  /api/v1/plans/{id}     Fetch a single plan
//! ```
//!
//! Plan creation is the gateway's canonical mutation: it requires an
//! `Idempotency-Key` header (enforced by the interceptor) and a membership
//! role permitted by the access policy.

use std::sync::RwLock;

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::access::AccessPolicy;
use crate::domain::{Error, ProblemDetail};
use crate::inbound::http::ApiResult;
use crate::inbound::http::access::enforce;

/// Maximum plan name length in characters.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum plan description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Request payload for creating a plan.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    /// Human-readable plan name.
    pub name: Option<String>,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A stored urban plan.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Unique plan identifier.
    pub id: Uuid,
    /// Human-readable plan name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// In-memory plan storage shared across workers.
#[derive(Debug, Default)]
pub struct PlanRegistry {
    plans: RwLock<Vec<Plan>>,
}

impl PlanRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new plan and return it.
    pub fn insert(&self, name: String, description: Option<String>) -> Result<Plan, Error> {
        let plan = Plan {
            id: Uuid::new_v4(),
            name,
            description,
            created_at: Utc::now(),
        };
        let mut plans = self
            .plans
            .write()
            .map_err(|_| Error::internal("plan registry lock poisoned"))?;
        plans.push(plan.clone());
        Ok(plan)
    }

    /// All stored plans, oldest first.
    pub fn list(&self) -> Result<Vec<Plan>, Error> {
        let plans = self
            .plans
            .read()
            .map_err(|_| Error::internal("plan registry lock poisoned"))?;
        Ok(plans.clone())
    }

    /// Look up a plan by id.
    pub fn get(&self, id: Uuid) -> Result<Option<Plan>, Error> {
        let plans = self
            .plans
            .read()
            .map_err(|_| Error::internal("plan registry lock poisoned"))?;
        Ok(plans.iter().find(|plan| plan.id == id).cloned())
    }
}

/// Validated plan fields.
#[derive(Debug)]
struct ParsedPlan {
    name: String,
    description: Option<String>,
}

fn parse_create_request(payload: CreatePlanRequest) -> Result<ParsedPlan, Error> {
    let mut violations = Vec::new();

    let name = payload.name.map(|n| n.trim().to_owned()).unwrap_or_default();
    if name.is_empty() {
        violations.push("plan.name: must not be empty".to_owned());
    } else if name.chars().count() > MAX_NAME_LENGTH {
        violations.push(format!(
            "plan.name: must be at most {MAX_NAME_LENGTH} characters"
        ));
    }

    let description = payload
        .description
        .map(|d| d.trim().to_owned())
        .filter(|d| !d.is_empty());
    if let Some(description) = &description
        && description.chars().count() > MAX_DESCRIPTION_LENGTH
    {
        violations.push(format!(
            "plan.description: must be at most {MAX_DESCRIPTION_LENGTH} characters"
        ));
    }

    if !violations.is_empty() {
        return Err(Error::validation(violations));
    }
    Ok(ParsedPlan { name, description })
}

/// Create an urban plan.
#[utoipa::path(
    post,
    path = "/api/v1/plans",
    request_body = CreatePlanRequest,
    params(
        ("Idempotency-Key" = String, Header, description = "Opaque token for idempotent retries"),
        ("X-Membership-Roles" = Option<String>, Header, description = "Comma-separated membership roles")
    ),
    responses(
        (status = 201, description = "Plan created", body = Plan),
        (status = 400, description = "Invalid request", body = ProblemDetail),
        (status = 401, description = "Unauthorised", body = ProblemDetail),
        (status = 403, description = "Forbidden", body = ProblemDetail),
        (status = 409, description = "Idempotency key in flight", body = ProblemDetail),
        (status = 422, description = "Idempotency key payload mismatch", body = ProblemDetail)
    ),
    tags = ["plans"],
    operation_id = "createPlan"
)]
#[post("/plans")]
pub async fn create_plan(
    policy: web::Data<AccessPolicy>,
    registry: web::Data<PlanRegistry>,
    request: HttpRequest,
    payload: web::Json<CreatePlanRequest>,
) -> ApiResult<HttpResponse> {
    enforce(&policy, &request)?;
    let parsed = parse_create_request(payload.into_inner())?;
    let plan = registry.insert(parsed.name, parsed.description)?;
    Ok(HttpResponse::Created().json(plan))
}

/// List all plans.
#[utoipa::path(
    get,
    path = "/api/v1/plans",
    responses(
        (status = 200, description = "Stored plans", body = [Plan])
    ),
    tags = ["plans"],
    operation_id = "listPlans"
)]
#[get("/plans")]
pub async fn list_plans(registry: web::Data<PlanRegistry>) -> ApiResult<HttpResponse> {
    let plans = registry.list()?;
    Ok(HttpResponse::Ok().json(plans))
}

/// Fetch a single plan by id.
#[utoipa::path(
    get,
    path = "/api/v1/plans/{id}",
    params(
        ("id" = Uuid, Path, description = "Plan identifier")
    ),
    responses(
        (status = 200, description = "The plan", body = Plan),
        (status = 404, description = "Plan not found", body = ProblemDetail)
    ),
    tags = ["plans"],
    operation_id = "getPlan"
)]
#[get("/plans/{id}")]
pub async fn get_plan(
    registry: web::Data<PlanRegistry>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let plan = registry
        .get(id)?
        .ok_or_else(|| Error::not_found("plan not found"))?;
    Ok(HttpResponse::Ok().json(plan))
}
