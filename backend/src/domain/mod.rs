//! Transport-free domain core: value types, ports, and services.

pub mod dns_template;
mod error;
pub mod idempotency;
pub mod keyed_mutex;
pub mod label;
pub mod money;
mod name;
pub mod ports;
pub mod purchase;
pub mod rate_limit;
pub mod search;
pub mod status;

pub use error::{DomainResult, Error, ErrorKind};
pub use keyed_mutex::{KeyedMutex, KeyedMutexGuard};
pub use name::{DomainName, DomainNameError, TldAllowlist};
pub use purchase::{
    NameserverMode, PurchaseLimits, PurchaseOutcome, PurchaseRequest, PurchaseService,
    PurchaseServiceDeps,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig, RetryAfter};
pub use search::{SearchRequest, SearchResponse, SearchService, SearchSeed};
pub use status::{DomainProjection, StatusService};

use ports::{
    ApiKeyRepositoryError, AuditLogError, DomainRepositoryError, IdempotencyStoreError,
    PurchaseRepositoryError, RegistrarError, SpendLedgerError,
};

// Port-error conversions used by services via `?`. Persistence faults are
// internal; registrar faults keep their own mapping (see below); duplicate
// orders are the one cross-instance race clients can fix by retrying with a
// fresh key.

impl From<IdempotencyStoreError> for Error {
    fn from(err: IdempotencyStoreError) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<SpendLedgerError> for Error {
    fn from(err: SpendLedgerError) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<DomainRepositoryError> for Error {
    fn from(err: DomainRepositoryError) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<AuditLogError> for Error {
    fn from(err: AuditLogError) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<ApiKeyRepositoryError> for Error {
    fn from(err: ApiKeyRepositoryError) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<PurchaseRepositoryError> for Error {
    fn from(err: PurchaseRepositoryError) -> Self {
        match &err {
            PurchaseRepositoryError::DuplicateOrder { .. } => {
                Error::new(ErrorKind::ValidationError, err.to_string())
            }
            _ => Error::internal(err.to_string()),
        }
    }
}

impl From<RegistrarError> for Error {
    fn from(err: RegistrarError) -> Self {
        match &err {
            RegistrarError::TldNotSupported { .. } => {
                Error::new(ErrorKind::ValidationError, err.to_string())
            }
            RegistrarError::InvalidNameserverCount { .. } => {
                Error::new(ErrorKind::NameserversRequired, err.to_string())
            }
            RegistrarError::DnsApplyPartialFailure {
                applied, failed, ..
            } => Error::internal(err.to_string()).with_details(serde_json::json!({
                "error": "DNS_APPLY_PARTIAL_FAILURE",
                "applied": applied,
                "failed": failed,
            })),
            _ => Error::internal(err.to_string()),
        }
    }
}
