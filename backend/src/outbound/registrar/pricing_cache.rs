//! Per-TLD pricing cache shared by driver instances.
//!
//! Registrar pricing endpoints are slow and heavily rate limited, so quotes
//! reuse a recent per-TLD snapshot. Entries expire after a fixed TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::RwLock;

/// How long a pricing snapshot stays servable.
pub(crate) const PRICING_TTL: Duration = Duration::from_secs(300);

/// Cached pricing metadata for one TLD.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TldPricing {
    pub price: Decimal,
    pub premium: bool,
    pub privacy_price: Decimal,
}

#[derive(Debug)]
struct Entry {
    pricing: TldPricing,
    fetched_at: Instant,
}

/// Concurrent map of TLD → pricing snapshot.
#[derive(Debug, Default)]
pub(crate) struct PricingCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl PricingCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetch a live snapshot for `tld`, if one exists.
    pub(crate) async fn get(&self, tld: &str) -> Option<TldPricing> {
        self.get_at(tld, Instant::now()).await
    }

    async fn get_at(&self, tld: &str, now: Instant) -> Option<TldPricing> {
        let entries = self.entries.read().await;
        entries.get(tld).and_then(|entry| {
            (now.duration_since(entry.fetched_at) < PRICING_TTL).then(|| entry.pricing.clone())
        })
    }

    /// Store a fresh snapshot for `tld`.
    pub(crate) async fn insert(&self, tld: &str, pricing: TldPricing) {
        self.insert_at(tld, pricing, Instant::now()).await;
    }

    async fn insert_at(&self, tld: &str, pricing: TldPricing, fetched_at: Instant) {
        let mut entries = self.entries.write().await;
        entries.insert(tld.to_owned(), Entry {
            pricing,
            fetched_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(cents: i64) -> TldPricing {
        TldPricing {
            price: Decimal::new(cents, 2),
            premium: false,
            privacy_price: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn fresh_entries_are_served() {
        let cache = PricingCache::new();
        cache.insert("com", pricing(968)).await;
        assert_eq!(cache.get("com").await, Some(pricing(968)));
    }

    #[tokio::test]
    async fn unknown_tlds_miss() {
        let cache = PricingCache::new();
        assert_eq!(cache.get("pizza").await, None);
    }

    #[tokio::test]
    async fn stale_entries_expire() {
        let cache = PricingCache::new();
        let fetched = Instant::now() - PRICING_TTL - Duration::from_secs(1);
        cache.insert_at("com", pricing(968), fetched).await;
        assert_eq!(cache.get("com").await, None);
    }

    #[tokio::test]
    async fn newer_snapshots_replace_older_ones() {
        let cache = PricingCache::new();
        cache.insert("com", pricing(968)).await;
        cache.insert("com", pricing(1099)).await;
        assert_eq!(cache.get("com").await, Some(pricing(1099)));
    }
}
