//! Idempotency key types: the client-supplied UUID and the ledger key.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainName;

/// Validation errors for [`ClientKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyValidationError {
    /// The key string was empty.
    EmptyKey,
    /// The key string was not a valid UUID.
    InvalidKey,
}

impl fmt::Display for ClientKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "idempotency key must not be empty"),
            Self::InvalidKey => write!(f, "idempotency key must be a valid UUID"),
        }
    }
}

impl std::error::Error for ClientKeyValidationError {}

/// Client-provided idempotency key (UUID v4).
///
/// Clients send one per purchase attempt and repeat it on retry. The server
/// never generates these; a retry is only safe because the client proves it
/// is the same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientKey(Uuid, String);

impl ClientKey {
    /// Validate and construct a [`ClientKey`] from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ClientKeyValidationError::EmptyKey`] for empty input, or
    /// [`ClientKeyValidationError::InvalidKey`] when the input is not a
    /// valid UUID or carries surrounding whitespace.
    pub fn new(key: impl AsRef<str>) -> Result<Self, ClientKeyValidationError> {
        Self::from_owned(key.as_ref().to_owned())
    }

    /// Generate a random key. Primarily useful for tests.
    pub fn random() -> Self {
        let uuid = Uuid::new_v4();
        Self(uuid, uuid.to_string())
    }

    fn from_owned(key: String) -> Result<Self, ClientKeyValidationError> {
        if key.is_empty() {
            return Err(ClientKeyValidationError::EmptyKey);
        }
        if key.trim() != key {
            return Err(ClientKeyValidationError::InvalidKey);
        }
        let parsed = Uuid::parse_str(&key).map_err(|_| ClientKeyValidationError::InvalidKey)?;
        Ok(Self(parsed, key))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for ClientKey {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ClientKey> for String {
    fn from(value: ClientKey) -> Self {
        value.1
    }
}

impl TryFrom<String> for ClientKey {
    type Error = ClientKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Durable idempotency-ledger key: `buy:{normalized-domain}:{client-uuid}`.
///
/// Scoping the key by domain means the same client UUID aimed at two
/// different domains never collides, while a retry of the same purchase maps
/// to the same ledger row and the same in-process mutex.
///
/// # Examples
///
/// ```
/// # use backend::domain::idempotency::{ClientKey, PurchaseKey};
/// # use backend::domain::DomainName;
/// let domain = DomainName::parse("example.com").expect("valid name");
/// let client = ClientKey::new("550e8400-e29b-41d4-a716-446655440000").expect("valid key");
/// let key = PurchaseKey::for_purchase(&domain, &client);
/// assert_eq!(
///     key.as_str(),
///     "buy:example.com:550e8400-e29b-41d4-a716-446655440000"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PurchaseKey(String);

impl PurchaseKey {
    /// Build the ledger key for one purchase attempt.
    pub fn for_purchase(domain: &DomainName, client_key: &ClientKey) -> Self {
        Self(format!("buy:{domain}:{client_key}"))
    }

    /// Reconstruct a key from its stored text (trusted input from the
    /// database).
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key text as persisted.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PurchaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
