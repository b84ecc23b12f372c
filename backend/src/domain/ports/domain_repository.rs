//! Port abstraction for persisted domain records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::DomainName;

use super::define_port_error;
use super::registrar::Provider;

/// Persisted lifecycle state of a domain owned by this system.
///
/// Not to be confused with the registrar-side lifecycle; this is the
/// projection served by status lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainStatus {
    Available,
    Purchased,
    DnsApplied,
    Error,
}

impl DomainStatus {
    /// Stable text persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Purchased => "PURCHASED",
            Self::DnsApplied => "DNS_APPLIED",
            Self::Error => "ERROR",
        }
    }

    /// Parse the persisted text.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "AVAILABLE" => Some(Self::Available),
            "PURCHASED" => Some(Self::Purchased),
            "DNS_APPLIED" => Some(Self::DnsApplied),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Persisted domain row.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub id: Uuid,
    pub name: DomainName,
    pub user_id: Uuid,
    pub registrar: Provider,
    pub status: DomainStatus,
    pub privacy: bool,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or refreshing a domain row at purchase time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDomain {
    pub name: DomainName,
    pub user_id: Uuid,
    pub registrar: Provider,
    pub privacy: bool,
    pub auto_renew: bool,
}

define_port_error! {
    /// Errors raised by domain repository adapters.
    pub enum DomainRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "domain repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "domain repository query failed: {message}",
    }
}

/// Port for domain persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// Create the domain row with status `PURCHASED`, or refresh an existing
    /// row (owner, registrar, privacy, status) for the same name.
    async fn upsert_purchased(
        &self,
        new_domain: &NewDomain,
    ) -> Result<DomainRecord, DomainRepositoryError>;

    /// Advance a purchased domain to `DNS_APPLIED`.
    async fn mark_dns_applied(&self, id: Uuid) -> Result<(), DomainRepositoryError>;

    /// Fetch a domain row by its unique name.
    async fn find_by_name(
        &self,
        name: &DomainName,
    ) -> Result<Option<DomainRecord>, DomainRepositoryError>;
}

/// Fixture implementation: upserts echo back a synthetic row, lookups miss.
#[derive(Debug, Default)]
pub struct FixtureDomainRepository;

#[async_trait]
impl DomainRepository for FixtureDomainRepository {
    async fn upsert_purchased(
        &self,
        new_domain: &NewDomain,
    ) -> Result<DomainRecord, DomainRepositoryError> {
        let now = Utc::now();
        Ok(DomainRecord {
            id: Uuid::new_v4(),
            name: new_domain.name.clone(),
            user_id: new_domain.user_id,
            registrar: new_domain.registrar,
            status: DomainStatus::Purchased,
            privacy: new_domain.privacy,
            auto_renew: new_domain.auto_renew,
            created_at: now,
            updated_at: now,
        })
    }

    async fn mark_dns_applied(&self, _id: Uuid) -> Result<(), DomainRepositoryError> {
        Ok(())
    }

    async fn find_by_name(
        &self,
        _name: &DomainName,
    ) -> Result<Option<DomainRecord>, DomainRepositoryError> {
        Ok(None)
    }
}
