//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::ApiKeyRepository;
use crate::domain::{PurchaseService, RateLimiter, SearchService, StatusService};

/// Dependency bundle for constructing [`HttpState`].
pub struct HttpStatePorts {
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub purchase: Arc<PurchaseService>,
    pub search: Arc<SearchService>,
    pub status: Arc<StatusService>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub purchase: Arc<PurchaseService>,
    pub search: Arc<SearchService>,
    pub status: Arc<StatusService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl HttpState {
    /// Construct state from explicit implementations.
    pub fn new(ports: HttpStatePorts) -> Self {
        Self {
            api_keys: ports.api_keys,
            purchase: ports.purchase,
            search: ports.search,
            status: ports.status,
            rate_limiter: ports.rate_limiter,
        }
    }
}
