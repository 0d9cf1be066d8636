//! Membership-role extraction and endpoint access enforcement.
//!
//! The upstream identity proxy resolves the caller's organization
//! memberships and forwards them as a comma-separated `X-Membership-Roles`
//! header. Handlers check the declarative [`AccessPolicy`] table against
//! those roles with a single [`enforce`] call.

use actix_web::HttpRequest;

use crate::domain::access::{AccessPolicy, MembershipRole};
use crate::domain::{ApiResult, Error};

/// Header carrying the caller's membership roles, comma separated.
pub const MEMBERSHIP_ROLES_HEADER: &str = "X-Membership-Roles";

/// Parse the roles the caller holds from the request headers.
///
/// A missing header means the caller holds no roles; that is only an error
/// once a guarded endpoint is involved. An unknown role token is rejected
/// outright rather than silently dropped, since it usually indicates a
/// misconfigured proxy.
pub fn held_roles(req: &HttpRequest) -> Result<Vec<MembershipRole>, Error> {
    let Some(value) = req.headers().get(MEMBERSHIP_ROLES_HEADER) else {
        return Ok(Vec::new());
    };
    let raw = value
        .to_str()
        .map_err(|_| Error::invalid_request("X-Membership-Roles header is not valid ASCII"))?;
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<MembershipRole>()
                .map_err(|err| Error::invalid_request(err.to_string()))
        })
        .collect()
}

/// Check the policy table for the current request.
///
/// # Errors
///
/// Propagates role parsing failures and the unauthorized/forbidden
/// outcomes of [`AccessPolicy::authorize`].
pub fn enforce(policy: &AccessPolicy, req: &HttpRequest) -> ApiResult<()> {
    let held = held_roles(req)?;
    policy.authorize(req.method().as_str(), req.path(), &held)
}
