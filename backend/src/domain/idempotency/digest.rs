//! Request digest: canonical JSON hashing of purchase parameters.

use std::fmt;

use rust_decimal::Decimal;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domain::DomainName;

/// Failures while computing or reconstructing a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// A stored digest had the wrong byte length.
    InvalidLength { expected: usize, actual: usize },
    /// Canonical JSON serialization failed.
    Serialization { message: String },
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { expected, actual } => {
                write!(f, "request digest must be {expected} bytes, got {actual}")
            }
            Self::Serialization { message } => {
                write!(f, "failed to serialize canonical digest input: {message}")
            }
        }
    }
}

impl std::error::Error for DigestError {}

/// SHA-256 digest of the canonicalized purchase parameters.
///
/// Two requests sharing an idempotency key must also share this digest;
/// otherwise the replay is a different purchase wearing the same key and is
/// rejected without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDigest([u8; 32]);

impl RequestDigest {
    /// Digest the parameters that define a purchase's identity.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Serialization`] when the canonical JSON cannot
    /// be encoded.
    pub fn for_purchase(
        domain: &DomainName,
        years: u8,
        whois_privacy: bool,
        quoted_total_usd: Decimal,
    ) -> Result<Self, DigestError> {
        canonicalize_and_hash(&json!({
            "domain": domain.as_str(),
            "years": years,
            "whois_privacy": whois_privacy,
            "quoted_total_usd": quoted_total_usd,
        }))
    }

    /// Reconstruct a digest from stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::InvalidLength`] when the slice is not exactly
    /// 32 bytes.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, DigestError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| DigestError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Canonicalize a JSON value (recursively sorted object keys, compact
/// encoding) and hash it with SHA-256.
pub fn canonicalize_and_hash(value: &serde_json::Value) -> Result<RequestDigest, DigestError> {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).map_err(|err| DigestError::Serialization {
        message: err.to_string(),
    })?;
    let hash: [u8; 32] = Sha256::digest(&bytes).into();
    Ok(RequestDigest(hash))
}

/// Recursively sort object keys for a canonical representation. Array order
/// is significant and preserved.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());
            let canonical_map: serde_json::Map<String, serde_json::Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::Value::Object(canonical_map)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}
