//! Problem-detail translation middleware.
//!
//! The outermost error boundary: any error escaping a handler or an inner
//! middleware is converted into a problem-detail response with the failing
//! request path stamped as `instance`. Successful responses pass through
//! untouched, so an idempotent replay stays byte-identical.

use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{debug, error};

use crate::domain::{self, ProblemDetail};
use crate::inbound::http::error::render_problem;
use crate::middleware::trace::TraceId;

/// Middleware normalizing every error into a problem-detail response.
#[derive(Clone)]
pub struct ProblemJson;

impl<S, B> Transform<S, ServiceRequest> for ProblemJson
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ProblemJsonMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProblemJsonMiddleware { service }))
    }
}

/// Service wrapper produced by [`ProblemJson`].
pub struct ProblemJsonMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ProblemJsonMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let http_req = req.request().clone();
        let fut = self.service.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(res) => Ok(res.map_into_left_body()),
                Err(err) => {
                    let problem = translate(&err, http_req.path());
                    let trace_id = TraceId::of(&http_req);
                    if problem.status() >= 500 {
                        error!(
                            error = %err,
                            instance = %problem.instance(),
                            trace_id = ?trace_id,
                            "request failed"
                        );
                    } else {
                        debug!(
                            status = problem.status(),
                            instance = %problem.instance(),
                            trace_id = ?trace_id,
                            "request rejected"
                        );
                    }
                    let response = render_problem(&problem);
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

/// Translate any service error into a problem detail.
///
/// Domain errors carry their own code, message, and violations. Other
/// framework errors keep their declared status: client errors expose their
/// display message, while anything rendering 5xx is redacted to the
/// generic internal problem so internals never leak.
fn translate(err: &Error, instance: &str) -> ProblemDetail {
    if let Some(domain_err) = err.as_error::<domain::Error>() {
        return domain_err.to_problem(instance);
    }
    let status = err.as_response_error().status_code();
    if status.is_server_error() {
        return ProblemDetail::internal(instance);
    }
    let reason = status.canonical_reason().unwrap_or("Error");
    let message = err.to_string();
    let title = if message.trim().is_empty() {
        reason.to_owned()
    } else {
        message
    };
    ProblemDetail::new(status.as_u16(), title, instance).with_detail(reason)
}
