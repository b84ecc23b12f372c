//! Outbound adapters: persistence, registrar drivers, metrics.

pub mod metrics;
pub mod persistence;
pub mod registrar;
