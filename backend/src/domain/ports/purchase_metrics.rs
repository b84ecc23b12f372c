//! Port abstraction for purchase pipeline metrics.
//!
//! Counter increments are infallible on every backing implementation, so
//! the port is synchronous and returns nothing; adapters own registration
//! errors at construction time.

use super::registrar::Provider;

/// Port for recording purchase pipeline outcomes.
#[cfg_attr(test, mockall::automock)]
pub trait PurchaseMetrics: Send + Sync {
    /// A purchase committed through `provider`.
    fn record_commit(&self, provider: Provider);

    /// A stored response was replayed for a retried key.
    fn record_replay(&self);

    /// The guarded region failed with the given error kind label.
    fn record_failure(&self, kind: &'static str);
}

/// No-op implementation for wiring without a metrics registry.
#[derive(Debug, Default)]
pub struct NoOpPurchaseMetrics;

impl PurchaseMetrics for NoOpPurchaseMetrics {
    fn record_commit(&self, _provider: Provider) {}

    fn record_replay(&self) {}

    fn record_failure(&self, _kind: &'static str) {}
}
