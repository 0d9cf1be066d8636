//! Request payload fingerprinting.
//!
//! A retry carrying the same idempotency key must also carry the same
//! payload; otherwise the client is accidentally reusing a key for a
//! different operation. Payloads are fingerprinted with SHA-256 so the
//! comparison works without retaining the original request body.
//!
//! JSON payloads are canonicalized first (object keys sorted recursively,
//! compact serialization) so semantically equivalent bodies hash
//! identically regardless of whitespace or key ordering. Non-JSON payloads
//! hash their raw bytes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a request payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayloadHash([u8; 32]);

/// Error raised when decoding a [`PayloadHash`] from its hex form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadHashDecodeError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for PayloadHashDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "payload hash must be 64 lowercase hex characters, got '{}'",
            self.input
        )
    }
}

impl std::error::Error for PayloadHashDecodeError {}

impl PayloadHash {
    /// Construct from a 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Access the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<PayloadHash> for String {
    fn from(value: PayloadHash) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for PayloadHash {
    type Error = PayloadHashDecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let decoded = hex::decode(&value).map_err(|_| PayloadHashDecodeError {
            input: value.clone(),
        })?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| PayloadHashDecodeError { input: value })?;
        Ok(Self(bytes))
    }
}

/// Fingerprint a raw request payload.
///
/// Bodies that parse as JSON are canonicalized before hashing; anything
/// else (including the empty body) hashes its raw bytes.
///
/// # Examples
///
/// ```
/// use planner_gateway::domain::idempotency::hash_request_payload;
///
/// let a = hash_request_payload(br#"{"name":"riverside","zone":"r1"}"#);
/// let b = hash_request_payload(br#"{"zone":"r1","name":"riverside"}"#);
/// assert_eq!(a, b);
/// ```
pub fn hash_request_payload(payload: &[u8]) -> PayloadHash {
    let digest = match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => {
            let canonical = canonicalize(&value);
            // Compact serialization of a canonical Value cannot fail.
            match serde_json::to_vec(&canonical) {
                Ok(bytes) => Sha256::digest(&bytes),
                Err(_) => Sha256::digest(payload),
            }
        }
        Err(_) => Sha256::digest(payload),
    };
    PayloadHash::from_bytes(digest.into())
}

/// Recursively sort object keys for a canonical JSON representation.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());
            serde_json::Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_does_not_change_the_hash() {
        let a = hash_request_payload(br#"{"b": 2, "a": 1}"#);
        let b = hash_request_payload(br#"{"a":1,"b":2}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn nested_objects_are_canonicalized() {
        let a = hash_request_payload(br#"{"outer": {"y": 1, "x": 2}}"#);
        let b = hash_request_payload(br#"{"outer":{"x":2,"y":1}}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn different_payloads_hash_differently() {
        let a = hash_request_payload(br#"{"name":"riverside"}"#);
        let b = hash_request_payload(br#"{"name":"hillside"}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn array_order_is_significant() {
        let a = hash_request_payload(br"[1,2]");
        let b = hash_request_payload(br"[2,1]");
        assert_ne!(a, b);
    }

    #[test]
    fn non_json_payloads_hash_raw_bytes() {
        let a = hash_request_payload(b"not json");
        let b = hash_request_payload(b"not json");
        let c = hash_request_payload(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_payload_hash_is_stable() {
        assert_eq!(hash_request_payload(b""), hash_request_payload(b""));
    }

    #[test]
    fn hex_round_trip() {
        let hash = hash_request_payload(b"{}");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        let back = PayloadHash::try_from(hex).expect("valid hex");
        assert_eq!(back, hash);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(PayloadHash::try_from("zz".to_owned()).is_err());
        assert!(PayloadHash::try_from("ab".repeat(8)).is_err());
    }
}
