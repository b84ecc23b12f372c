//! Domain error representation shared across adapters.
//!
//! Keep this module free from HTTP or framework concerns so the same error
//! shape can be mapped by any adapter (HTTP handlers, background sweeps).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// Stable machine-readable error kind.
///
/// Variants serialize under their own names (`"PriceDrift"`, not
/// `"price_drift"`) because clients switch on the literal kind string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input failed schema, regex, or range validation.
    ValidationError,
    /// The label safety filter rejected a domain label.
    UnsafeLabel,
    /// A non-ASCII label was supplied without opting into Unicode.
    NonAsciiNotAllowed,
    /// A Unicode label was not supplied in `xn--` punycode form.
    UnicodeMustUsePunycode,
    /// A premium domain was requested without `allow_premium`.
    PremiumNotAllowed,
    /// The quoted total exceeds the per-transaction ceiling.
    SpendCapExceeded,
    /// The purchase would exceed the per-account daily ceiling.
    DailyCapExceeded,
    /// The requested DNS template id is not registered.
    UnknownDnsTemplate,
    /// Custom nameserver mode without a valid nameserver list.
    NameserversRequired,
    /// Missing or invalid bearer credential.
    Unauthorized,
    /// The requested route or resource does not exist.
    NotFound,
    /// An idempotency key was replayed with a different request digest.
    IdempotencyMismatch,
    /// The fresh server quote drifted beyond tolerance from the client quote.
    PriceDrift,
    /// The caller exhausted its rate-limit budget.
    RateLimited,
    /// An unexpected fault occurred on the server.
    InternalError,
}

/// Domain error payload consumed by adapters.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use backend::domain::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::NotFound, "no such domain");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Error)]
#[error("{message}")]
pub struct Error {
    #[serde(rename = "error")]
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
}

impl Error {
    /// Create a new error.
    ///
    /// # Panics
    ///
    /// Panics when `message` is blank; error text is always authored by this
    /// crate, so a blank message is a programming mistake.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        assert!(
            !message.trim().is_empty(),
            "domain error messages must not be blank"
        );
        Self {
            kind,
            message,
            details: None,
            trace_id: None,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message returned to clients.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary structured details for clients.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Correlation identifier for tracing this error across systems.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{Error, ErrorKind};
    /// use serde_json::json;
    /// let err = Error::new(ErrorKind::PriceDrift, "quote drifted")
    ///     .with_details(json!({ "drift": "1.00" }));
    /// assert!(err.details().is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a trace identifier to the error.
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Convenience constructor for [`ErrorKind::ValidationError`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    /// Convenience constructor for [`ErrorKind::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorKind::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Convenience constructor for [`ErrorKind::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Redact server-side detail so the payload is safe to expose to clients.
    ///
    /// Internal errors keep their kind and trace identifier but replace the
    /// message with a generic explanation and drop structured details.
    pub fn redacted_for_clients(&self) -> Self {
        if !matches!(self.kind, ErrorKind::InternalError) {
            return self.clone();
        }
        let mut redacted = self.clone();
        redacted.message = "Internal server error".to_string();
        redacted.details = None;
        redacted
    }
}

/// Convenience alias for domain operations.
pub type DomainResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::price_drift(ErrorKind::PriceDrift, "\"PriceDrift\"")]
    #[case::idempotency(ErrorKind::IdempotencyMismatch, "\"IdempotencyMismatch\"")]
    #[case::rate_limited(ErrorKind::RateLimited, "\"RateLimited\"")]
    fn kinds_serialize_as_literal_names(#[case] kind: ErrorKind, #[case] expected: &str) {
        let serialized = serde_json::to_string(&kind).expect("kind serializes");
        assert_eq!(serialized, expected);
    }

    #[test]
    fn error_serializes_under_wire_field_names() {
        let err = Error::new(ErrorKind::DailyCapExceeded, "cap reached")
            .with_details(json!({ "remaining": "10.00" }));
        let value = serde_json::to_value(&err).expect("error serializes");

        assert_eq!(value["error"], "DailyCapExceeded");
        assert_eq!(value["message"], "cap reached");
        assert_eq!(value["details"]["remaining"], "10.00");
    }

    #[test]
    fn redaction_replaces_internal_detail() {
        let err = Error::internal("connection string leaked")
            .with_details(json!({ "dsn": "postgres://" }))
            .with_trace_id("abc");
        let redacted = err.redacted_for_clients();

        assert_eq!(redacted.message(), "Internal server error");
        assert!(redacted.details().is_none());
        assert_eq!(redacted.trace_id(), Some("abc"));
    }

    #[test]
    fn redaction_keeps_client_errors_intact() {
        let err = Error::validation("years out of range");
        assert_eq!(err.redacted_for_clients(), err);
    }

    #[test]
    #[should_panic(expected = "must not be blank")]
    fn blank_messages_are_rejected() {
        let _ = Error::validation("  ");
    }
}
