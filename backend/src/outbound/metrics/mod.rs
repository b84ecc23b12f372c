//! Prometheus adapters for domain metric ports.

mod prometheus_purchase;

pub use prometheus_purchase::PrometheusPurchaseMetrics;
