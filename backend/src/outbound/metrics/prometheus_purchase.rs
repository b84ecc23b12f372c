//! Prometheus adapter for purchase pipeline metrics.
//!
//! # Metric Specification
//!
//! - `gateway_purchases_total{registrar}` — committed purchases.
//! - `gateway_purchase_replays_total` — idempotent replays served.
//! - `gateway_purchase_failures_total{kind}` — guarded-region failures by
//!   error kind label.

use prometheus::{CounterVec, IntCounter, Opts, Registry};

use crate::domain::ports::{Provider, PurchaseMetrics};

/// Prometheus-backed purchase metrics recorder.
pub struct PrometheusPurchaseMetrics {
    purchases_total: CounterVec,
    replays_total: IntCounter,
    failures_total: CounterVec,
}

impl PrometheusPurchaseMetrics {
    /// Create and register metrics with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error when a metric cannot be registered, e.g. when a
    /// metric with the same name already exists in the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let purchases_total = CounterVec::new(
            Opts::new("gateway_purchases_total", "Committed purchases"),
            &["registrar"],
        )?;
        let replays_total = IntCounter::new(
            "gateway_purchase_replays_total",
            "Idempotent purchase replays served",
        )?;
        let failures_total = CounterVec::new(
            Opts::new(
                "gateway_purchase_failures_total",
                "Purchase pipeline failures by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(purchases_total.clone()))?;
        registry.register(Box::new(replays_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;
        Ok(Self {
            purchases_total,
            replays_total,
            failures_total,
        })
    }
}

impl PurchaseMetrics for PrometheusPurchaseMetrics {
    fn record_commit(&self, provider: Provider) {
        self.purchases_total
            .with_label_values(&[provider.as_str()])
            .inc();
    }

    fn record_replay(&self) {
        self.replays_total.inc();
    }

    fn record_failure(&self, kind: &'static str) {
        self.failures_total.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_metrics() -> (Registry, PrometheusPurchaseMetrics) {
        let registry = Registry::new();
        let metrics =
            PrometheusPurchaseMetrics::new(&registry).expect("metric registration succeeds");
        (registry, metrics)
    }

    #[test]
    fn registers_all_families() {
        let (registry, metrics) = make_metrics();
        metrics.record_commit(Provider::Porkbun);
        metrics.record_replay();
        metrics.record_failure("price_drift");

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.name().to_owned())
            .collect();
        assert!(names.contains(&"gateway_purchases_total".to_owned()));
        assert!(names.contains(&"gateway_purchase_replays_total".to_owned()));
        assert!(names.contains(&"gateway_purchase_failures_total".to_owned()));
    }

    #[test]
    fn commits_count_per_registrar() {
        let (_registry, metrics) = make_metrics();
        metrics.record_commit(Provider::Porkbun);
        metrics.record_commit(Provider::Porkbun);
        metrics.record_commit(Provider::Namecheap);

        let porkbun = metrics
            .purchases_total
            .with_label_values(&["porkbun"])
            .get();
        assert_eq!(porkbun as u64, 2);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = Registry::new();
        let _first = PrometheusPurchaseMetrics::new(&registry).expect("first registers");
        assert!(PrometheusPurchaseMetrics::new(&registry).is_err());
    }
}
