//! Port abstraction for the append-only audit trail.
//!
//! The pipeline writes audit entries and never reads them back; failures
//! here are logged by callers but do not fail the business operation.

use async_trait::async_trait;
use uuid::Uuid;

use super::define_port_error;

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditVerb {
    BuySuccess,
    BuyFail,
    Search,
}

impl AuditVerb {
    /// Stable text persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuySuccess => "BUY_SUCCESS",
            Self::BuyFail => "BUY_FAIL",
            Self::Search => "SEARCH",
        }
    }
}

define_port_error! {
    /// Errors raised by audit log adapters.
    pub enum AuditLogError {
        /// Store connection could not be established.
        Connection { message: String } => "audit log connection failed: {message}",
        /// Append failed during execution.
        Query { message: String } => "audit log append failed: {message}",
    }
}

/// Port for appending audit entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one entry. `user_id` is absent for unauthenticated actions.
    async fn record(
        &self,
        user_id: Option<Uuid>,
        verb: AuditVerb,
        payload: &serde_json::Value,
    ) -> Result<(), AuditLogError>;
}

/// Fixture implementation discarding entries.
#[derive(Debug, Default)]
pub struct FixtureAuditLog;

#[async_trait]
impl AuditLog for FixtureAuditLog {
    async fn record(
        &self,
        _user_id: Option<Uuid>,
        _verb: AuditVerb,
        _payload: &serde_json::Value,
    ) -> Result<(), AuditLogError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AuditVerb::BuySuccess, "BUY_SUCCESS")]
    #[case(AuditVerb::BuyFail, "BUY_FAIL")]
    #[case(AuditVerb::Search, "SEARCH")]
    fn verbs_persist_under_stable_names(#[case] verb: AuditVerb, #[case] text: &str) {
        assert_eq!(verb.as_str(), text);
    }
}
