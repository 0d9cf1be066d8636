//! Membership roles and the declarative endpoint access policy.
//!
//! Authorization is a plain data table: each rule names an endpoint
//! (method plus path pattern) and the membership roles allowed to call it.
//! A single [`AccessPolicy::authorize`] check consults the table; there is
//! no metadata reflection or per-handler decorator state. Endpoints with
//! no rule are open, matching callers that predate the policy.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::Error;

/// A named permission level a user holds within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MembershipRole {
    /// Organization owner.
    Owner,
    /// Organization administrator.
    Admin,
    /// Urban planner; may create and edit plans.
    Planner,
    /// Designer; may edit scenario layouts.
    Designer,
    /// Analyst; read access plus report generation.
    Analyst,
    /// Workshop facilitator.
    Facilitator,
    /// Read-only access.
    Viewer,
}

impl MembershipRole {
    /// All role variants, useful for iteration and diagnostics.
    pub const ALL: [MembershipRole; 7] = [
        MembershipRole::Owner,
        MembershipRole::Admin,
        MembershipRole::Planner,
        MembershipRole::Designer,
        MembershipRole::Analyst,
        MembershipRole::Facilitator,
        MembershipRole::Viewer,
    ];

    /// The wire string for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Planner => "planner",
            Self::Designer => "designer",
            Self::Analyst => "analyst",
            Self::Facilitator => "facilitator",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMembershipRoleError {
    /// The invalid input string.
    pub input: String,
}

impl fmt::Display for ParseMembershipRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variants: Vec<_> = MembershipRole::ALL.iter().map(|v| v.as_str()).collect();
        write!(
            f,
            "invalid membership role '{}': expected one of {}",
            self.input,
            variants.join(", ")
        )
    }
}

impl std::error::Error for ParseMembershipRoleError {}

impl FromStr for MembershipRole {
    type Err = ParseMembershipRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseMembershipRoleError {
                input: s.to_owned(),
            })
    }
}

/// One row of the policy table.
#[derive(Debug, Clone)]
struct PolicyRule {
    method: String,
    path: String,
    allowed: BTreeSet<MembershipRole>,
}

/// Declarative endpoint access policy.
///
/// Path patterns match segment-wise; a `{name}` segment matches any single
/// path segment, so `/api/v1/plans/{id}` covers every plan.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<PolicyRule>,
}

impl AccessPolicy {
    /// An empty policy: every endpoint is open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict an endpoint to the given roles.
    #[must_use]
    pub fn require(mut self, method: &str, path: &str, roles: &[MembershipRole]) -> Self {
        self.rules.push(PolicyRule {
            method: method.to_ascii_uppercase(),
            path: path.to_owned(),
            allowed: roles.iter().copied().collect(),
        });
        self
    }

    /// Roles required for an endpoint, or `None` when it is unguarded.
    pub fn required_roles(&self, method: &str, path: &str) -> Option<&BTreeSet<MembershipRole>> {
        self.rules
            .iter()
            .find(|rule| rule.method.eq_ignore_ascii_case(method) && path_matches(&rule.path, path))
            .map(|rule| &rule.allowed)
    }

    /// Check whether the held roles may call the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error when the endpoint is guarded and the
    /// caller holds no roles at all, and a forbidden error when none of the
    /// held roles is allowed.
    pub fn authorize(
        &self,
        method: &str,
        path: &str,
        held: &[MembershipRole],
    ) -> Result<(), Error> {
        let Some(allowed) = self.required_roles(method, path) else {
            return Ok(());
        };
        if held.is_empty() {
            return Err(Error::unauthorized(
                "a membership role is required for this operation",
            ));
        }
        if held.iter().any(|role| allowed.contains(role)) {
            Ok(())
        } else {
            Err(Error::forbidden(
                "none of the held membership roles permit this operation",
            ))
        }
    }
}

/// Segment-wise path match; `{name}` segments match any single segment.
fn path_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.trim_matches('/').split('/');
    let mut path_segments = path.trim_matches('/').split('/');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                let wildcard = p.starts_with('{') && p.ends_with('}');
                if !wildcard && p != s {
                    return false;
                }
            }
            _ => return false,
        }
    }
}
