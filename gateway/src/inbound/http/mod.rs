//! HTTP inbound adapter exposing REST endpoints.

use actix_web::web;

pub mod access;
pub mod error;
pub mod health;
pub mod plans;

pub use error::ApiResult;

/// Register all REST endpoints.
///
/// Health probes live at the root; everything else is versioned under
/// `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::ready).service(health::live).service(
        web::scope("/api/v1")
            .service(plans::create_plan)
            .service(plans::list_plans)
            .service(plans::get_plan),
    );
}
