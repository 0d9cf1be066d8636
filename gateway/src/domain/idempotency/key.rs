//! Idempotency key validation and storage addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace prefix for idempotency entries in the shared key-value store.
pub const STORAGE_KEY_PREFIX: &str = "idempotency";

/// Maximum accepted key length in bytes.
///
/// Keys are client-chosen tokens (typically UUIDs); anything longer is
/// rejected before it can bloat the store.
pub const MAX_KEY_LENGTH: usize = 255;

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty.
    Empty,
    /// The key exceeded [`MAX_KEY_LENGTH`] bytes.
    TooLong,
    /// The key contained whitespace or non-printable characters.
    Malformed,
}

impl fmt::Display for IdempotencyKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "idempotency key must not be empty"),
            Self::TooLong => write!(
                f,
                "idempotency key must be at most {MAX_KEY_LENGTH} bytes"
            ),
            Self::Malformed => write!(
                f,
                "idempotency key must contain only printable ASCII without whitespace"
            ),
        }
    }
}

impl std::error::Error for IdempotencyKeyValidationError {}

/// Client-provided idempotency key.
///
/// Clients send an opaque token via the `Idempotency-Key` HTTP header to
/// enable safe request retries. The gateway uses the key to detect duplicate
/// mutations and replay previously computed responses. Keys are treated as
/// opaque: any printable-ASCII token up to [`MAX_KEY_LENGTH`] bytes is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validate and construct an [`IdempotencyKey`] from a string.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyKeyValidationError::Empty`] for an empty input,
    /// [`IdempotencyKeyValidationError::TooLong`] when the input exceeds
    /// [`MAX_KEY_LENGTH`] bytes, and
    /// [`IdempotencyKeyValidationError::Malformed`] when the input contains
    /// whitespace or non-printable characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use planner_gateway::domain::idempotency::IdempotencyKey;
    ///
    /// let key = IdempotencyKey::new("abc-123").expect("valid key");
    /// assert_eq!(key.storage_key(), "idempotency:abc-123");
    /// assert!(IdempotencyKey::new("ab cd").is_err());
    /// ```
    pub fn new(key: impl AsRef<str>) -> Result<Self, IdempotencyKeyValidationError> {
        Self::from_owned(key.as_ref().to_owned())
    }

    /// Generate a random key.
    ///
    /// Primarily useful for testing.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    fn from_owned(key: String) -> Result<Self, IdempotencyKeyValidationError> {
        if key.is_empty() {
            return Err(IdempotencyKeyValidationError::Empty);
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(IdempotencyKeyValidationError::TooLong);
        }
        if !key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(IdempotencyKeyValidationError::Malformed);
        }
        Ok(Self(key))
    }

    /// Address of this key in the shared store: `idempotency:<key>`.
    pub fn storage_key(&self) -> String {
        format!("{STORAGE_KEY_PREFIX}:{}", self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}
