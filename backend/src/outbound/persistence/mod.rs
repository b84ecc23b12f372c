//! Diesel persistence adapters for the domain ports.

mod diesel_api_key_repository;
mod diesel_audit_log;
mod diesel_domain_repository;
mod diesel_idempotency_store;
mod diesel_purchase_repository;
mod diesel_spend_ledger;
mod models;
mod pool;
pub(crate) mod schema;

pub use diesel_api_key_repository::DieselApiKeyRepository;
pub use diesel_audit_log::DieselAuditLog;
pub use diesel_domain_repository::DieselDomainRepository;
pub use diesel_idempotency_store::DieselIdempotencyStore;
pub use diesel_purchase_repository::DieselPurchaseRepository;
pub use diesel_spend_ledger::DieselSpendLedger;
pub use pool::{DbPool, PoolConfig, PoolError};
