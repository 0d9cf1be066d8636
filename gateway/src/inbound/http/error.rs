//! HTTP adapter mapping for domain errors.
//!
//! Keeps the domain error type HTTP-agnostic while letting Actix handlers
//! turn domain failures into problem-detail responses via `?`. The
//! problem-detail middleware is the normal rendering path (it knows the
//! request path); the `ResponseError` impl here is the fallback when an
//! error reaches the framework boundary without passing through it.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use tracing::error;

use crate::domain::{Error, ProblemDetail};

/// Convenient result alias for HTTP handlers.
pub use crate::domain::ApiResult;

/// Media type for problem-detail responses.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Last-resort body when problem serialization itself fails.
const FALLBACK_BODY: &str = concat!(
    r#"{"type":"https://api.urban-planner.com/problems/500","#,
    r#""title":"Internal Server Error","status":500,"instance":""}"#
);

/// Render a problem detail as an HTTP response.
///
/// This is the last line of defence and must not fail: a serialization
/// error degrades to a minimal generic 500 body.
pub(crate) fn render_problem(problem: &ProblemDetail) -> HttpResponse {
    let status =
        StatusCode::from_u16(problem.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_string(problem) {
        Ok(body) => HttpResponse::build(status)
            .content_type(PROBLEM_CONTENT_TYPE)
            .body(body),
        Err(err) => {
            error!(error = %err, "failed to serialize problem detail");
            HttpResponse::InternalServerError()
                .content_type(PROBLEM_CONTENT_TYPE)
                .body(FALLBACK_BODY)
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        // No request context here; the problem middleware normally stamps
        // the instance path before an error gets this far.
        render_problem(&self.to_problem(""))
    }
}
