//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod api_key_repository;
mod audit_log;
mod domain_repository;
mod idempotency_store;
mod purchase_metrics;
mod purchase_repository;
mod registrar;
mod spend_ledger;

#[cfg(test)]
pub use api_key_repository::MockApiKeyRepository;
pub use api_key_repository::{
    ApiKeyRepository, ApiKeyRepositoryError, AuthenticatedUser, FixtureApiKeyRepository,
};
#[cfg(test)]
pub use audit_log::MockAuditLog;
pub use audit_log::{AuditLog, AuditLogError, AuditVerb, FixtureAuditLog};
#[cfg(test)]
pub use domain_repository::MockDomainRepository;
pub use domain_repository::{
    DomainRecord, DomainRepository, DomainRepositoryError, DomainStatus, FixtureDomainRepository,
    NewDomain,
};
#[cfg(test)]
pub use idempotency_store::MockIdempotencyStore;
pub use idempotency_store::{FixtureIdempotencyStore, IdempotencyStore, IdempotencyStoreError};
#[cfg(test)]
pub use purchase_metrics::MockPurchaseMetrics;
pub use purchase_metrics::{NoOpPurchaseMetrics, PurchaseMetrics};
#[cfg(test)]
pub use purchase_repository::MockPurchaseRepository;
pub use purchase_repository::{
    FixturePurchaseRepository, NewPurchase, PurchaseRecord, PurchaseRepository,
    PurchaseRepositoryError,
};
#[cfg(test)]
pub use registrar::MockRegistrarDriver;
pub use registrar::{
    AvailabilityEntry, DnsRecord, DomainStatusReport, FixtureRegistrarDriver, MAX_NAMESERVERS,
    MIN_NAMESERVERS, Provider, Quote, RecordType, RegisterReceipt, RegisterRequest,
    RegistrantContact, RegistrarDomainState, RegistrarDriver, RegistrarError,
};
#[cfg(test)]
pub use spend_ledger::MockSpendLedger;
pub use spend_ledger::{
    FixtureSpendLedger, SpendLedger, SpendLedgerError, remaining, utc_day, would_exceed,
};
