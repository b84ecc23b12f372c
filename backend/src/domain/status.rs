//! Status lookup: project a persisted domain row for clients.
//!
//! The projection reflects what this system knows, not the registrar-side
//! lifecycle. Unknown names answer `unknown` rather than erroring so the
//! endpoint is safely pollable.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::ports::{DomainRepository, DomainStatus};
use crate::domain::{DomainName, DomainResult, Error, TldAllowlist};

/// Client-facing domain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionState {
    Purchased,
    DnsApplied,
    Error,
    Unknown,
}

/// Status answer for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct DomainProjection {
    pub domain: String,
    pub state: ProjectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    /// Last transition time, ISO-8601 UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Orchestrates status lookups.
pub struct StatusService {
    domains: Arc<dyn DomainRepository>,
    allowlist: TldAllowlist,
}

impl StatusService {
    /// Assemble the service.
    pub fn new(domains: Arc<dyn DomainRepository>, allowlist: TldAllowlist) -> Self {
        Self { domains, allowlist }
    }

    /// Project the persisted state of `raw` (normalized and TLD-checked).
    pub async fn lookup(&self, raw: &str) -> DomainResult<DomainProjection> {
        let name =
            DomainName::parse(raw).map_err(|err| Error::validation(err.to_string()))?;
        if !self.allowlist.permits(name.tld()) {
            return Err(Error::validation(format!(
                "TLD .{} is not permitted",
                name.tld()
            )));
        }

        let Some(record) = self.domains.find_by_name(&name).await? else {
            return Ok(DomainProjection {
                domain: name.as_str().to_owned(),
                state: ProjectionState::Unknown,
                registrar: None,
                updated_at: None,
                details: Some(serde_json::json!({
                    "message": "domain is not tracked by this gateway",
                })),
            });
        };

        let state = match record.status {
            DomainStatus::Purchased => ProjectionState::Purchased,
            DomainStatus::DnsApplied => ProjectionState::DnsApplied,
            DomainStatus::Error => ProjectionState::Error,
            DomainStatus::Available => ProjectionState::Unknown,
        };
        Ok(DomainProjection {
            domain: name.as_str().to_owned(),
            state,
            registrar: Some(record.registrar.as_str().to_owned()),
            updated_at: Some(record.updated_at.to_rfc3339()),
            details: None,
        })
    }
}
