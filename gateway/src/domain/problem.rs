//! Problem-detail error payloads.
//!
//! Every error response from the gateway shares one machine-readable shape
//! regardless of origin: a `type` URI identifying the failure category, a
//! short `title`, the HTTP `status`, an optional `detail`, the failing
//! request path as `instance`, and optional per-field validation `errors`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Base URI for problem category identifiers; the status code is appended.
pub const PROBLEM_TYPE_BASE: &str = "https://api.urban-planner.com/problems";

/// Catch-all key for validation messages that do not name a field.
pub const GENERAL_ERRORS_KEY: &str = "general";

/// Structured error response payload.
///
/// The shape is symmetric across all error categories; only the populated
/// fields vary. `detail` and `errors` are omitted from the serialized form
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetail {
    /// URI identifying the error category.
    #[serde(rename = "type")]
    #[schema(example = "https://api.urban-planner.com/problems/400")]
    type_uri: String,
    /// Short human-readable summary.
    #[schema(example = "Idempotency-Key header is required for mutation operations")]
    title: String,
    /// HTTP status code.
    #[schema(example = 400)]
    status: u16,
    /// Longer human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    /// Path of the failing request.
    #[schema(example = "/api/v1/plans")]
    instance: String,
    /// Validation messages grouped by `object.field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ProblemDetail {
    /// Construct a problem for the given status, title, and request path.
    pub fn new(status: u16, title: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            type_uri: format!("{PROBLEM_TYPE_BASE}/{status}"),
            title: title.into(),
            status,
            detail: None,
            instance: instance.into(),
            errors: None,
        }
    }

    /// Generic internal-server-error problem.
    ///
    /// Used when the underlying failure must not leak to the client.
    pub fn internal(instance: impl Into<String>) -> Self {
        Self::new(500, "Internal Server Error", instance)
    }

    /// Attach a longer explanation.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach grouped validation messages, dropping an empty map.
    #[must_use]
    pub fn with_errors(mut self, errors: BTreeMap<String, Vec<String>>) -> Self {
        self.errors = if errors.is_empty() {
            None
        } else {
            Some(errors)
        };
        self
    }

    /// URI identifying the error category.
    pub fn type_uri(&self) -> &str {
        &self.type_uri
    }

    /// Short summary.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Longer explanation, when one exists.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Path of the failing request.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Grouped validation messages, when any exist.
    pub fn errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.errors.as_ref()
    }
}

/// Group validation messages by field path.
///
/// Messages of the form `object.field: message` are grouped under the
/// `object.field` key; anything else collects under
/// [`GENERAL_ERRORS_KEY`].
pub fn group_violations(
    messages: impl IntoIterator<Item = String>,
) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for message in messages {
        match split_violation(&message) {
            Some((field, detail)) => grouped.entry(field).or_default().push(detail),
            None => grouped
                .entry(GENERAL_ERRORS_KEY.to_owned())
                .or_default()
                .push(message),
        }
    }
    grouped
}

/// Split `object.field: message` into its field path and message.
///
/// The object segment must precede the first dot and the field segment
/// runs to the first colon, mirroring the validation message convention
/// used by the API's DTO layer.
fn split_violation(message: &str) -> Option<(String, String)> {
    let (head, rest) = message.split_once(": ")?;
    let (object, field) = head.split_once('.')?;
    if object.is_empty() || field.is_empty() || rest.is_empty() || field.contains(':') {
        return None;
    }
    Some((format!("{object}.{field}"), rest.to_owned()))
}
