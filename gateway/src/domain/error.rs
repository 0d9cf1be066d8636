//! Domain-level error types.
//!
//! These errors are transport agnostic; the HTTP adapter and the
//! problem-detail middleware turn them into problem-detail responses.

use std::collections::BTreeMap;

use super::problem::{ProblemDetail, group_violations};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Authentication is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested resource does not exist.
    NotFound,
    /// The request conflicts with concurrent or prior state.
    Conflict,
    /// The request is well-formed but semantically unacceptable.
    UnprocessablePayload,
    /// A required backing service is unavailable.
    ServiceUnavailable,
    /// An unexpected internal failure.
    Internal,
}

impl ErrorCode {
    /// HTTP status this code maps to.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::UnprocessablePayload => 422,
            Self::ServiceUnavailable => 503,
            Self::Internal => 500,
        }
    }

    /// Canonical reason phrase for the mapped status.
    pub fn reason(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::Conflict => "Conflict",
            Self::UnprocessablePayload => "Unprocessable Entity",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::Internal => "Internal Server Error",
        }
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    message: String,
    violations: Option<BTreeMap<String, Vec<String>>>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorValidationError {
    /// The error message was empty.
    EmptyMessage,
}

impl std::fmt::Display for ErrorValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "error message must not be empty"),
        }
    }
}

impl std::error::Error for ErrorValidationError {}

impl Error {
    /// Create a new error, panicking if validation fails.
    ///
    /// Intended for compile-time message literals; use [`Error::try_new`]
    /// for untrusted input.
    ///
    /// # Examples
    ///
    /// ```
    /// use planner_gateway::domain::{Error, ErrorCode};
    ///
    /// let error = Error::new(ErrorCode::NotFound, "plan not found");
    /// assert_eq!(error.code(), ErrorCode::NotFound);
    /// assert_eq!(error.code().http_status(), 404);
    /// ```
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            violations: None,
        })
    }

    /// Build a validation failure from raw messages.
    ///
    /// Messages of the form `object.field: message` are grouped per field;
    /// the rest land in the `general` bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// use planner_gateway::domain::Error;
    ///
    /// let error = Error::validation(vec!["plan.name: must not be empty".to_owned()]);
    /// let violations = error.violations().expect("grouped violations");
    /// assert!(violations.contains_key("plan.name"));
    /// ```
    pub fn validation(messages: Vec<String>) -> Self {
        let mut error = Self::new(ErrorCode::InvalidRequest, "request validation failed");
        error.violations = Some(group_violations(messages));
        error
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Grouped field violations, when this is a validation failure.
    pub fn violations(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.violations.as_ref()
    }

    /// Render this error as a problem detail for the given request path.
    ///
    /// Internal errors are redacted to a generic title so implementation
    /// details never reach clients; everything else exposes the message as
    /// the title and the canonical reason phrase as the detail.
    pub fn to_problem(&self, instance: &str) -> ProblemDetail {
        if matches!(self.code, ErrorCode::Internal) {
            return ProblemDetail::internal(instance);
        }
        let mut problem =
            ProblemDetail::new(self.code.http_status(), self.message.clone(), instance)
                .with_detail(self.code.reason());
        if let Some(violations) = &self.violations {
            problem = problem.with_errors(violations.clone());
        }
        problem
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Convenience constructor for [`ErrorCode::UnprocessablePayload`].
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnprocessablePayload, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_their_statuses() {
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::Forbidden.http_status(), 403);
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::Conflict.http_status(), 409);
        assert_eq!(ErrorCode::UnprocessablePayload.http_status(), 422);
        assert_eq!(ErrorCode::ServiceUnavailable.http_status(), 503);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
    }

    #[test]
    fn rejects_empty_messages() {
        assert_eq!(
            Error::try_new(ErrorCode::NotFound, "  "),
            Err(ErrorValidationError::EmptyMessage)
        );
    }

    #[test]
    fn problem_carries_message_as_title() {
        let problem = Error::not_found("plan not found").to_problem("/api/v1/plans/42");
        assert_eq!(problem.status(), 404);
        assert_eq!(problem.title(), "plan not found");
        assert_eq!(problem.detail(), Some("Not Found"));
        assert_eq!(problem.instance(), "/api/v1/plans/42");
    }

    #[test]
    fn internal_errors_are_redacted() {
        let problem = Error::internal("connection pool exhausted").to_problem("/api/v1/plans");
        assert_eq!(problem.title(), "Internal Server Error");
        assert_eq!(problem.detail(), None);
    }

    #[test]
    fn validation_groups_violations() {
        let error = Error::validation(vec![
            "plan.name: must not be empty".to_owned(),
            "unexpected field".to_owned(),
        ]);
        let problem = error.to_problem("/api/v1/plans");
        let errors = problem.errors().expect("violations present");
        assert!(errors.contains_key("plan.name"));
        assert!(errors.contains_key("general"));
    }
}
