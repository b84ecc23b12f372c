//! Port abstraction for the append-only purchase record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::define_port_error;
use super::registrar::Provider;

/// Fields for appending one purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub domain_id: Uuid,
    pub registrar: Provider,
    pub order_id: String,
    pub years: u8,
    pub total_usd: Decimal,
    pub premium: bool,
}

/// Persisted purchase row.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub domain_id: Uuid,
    pub registrar: Provider,
    pub order_id: String,
    pub years: u8,
    pub total_usd: Decimal,
    pub premium: bool,
    pub created_at: DateTime<Utc>,
}

define_port_error! {
    /// Errors raised by purchase repository adapters.
    pub enum PurchaseRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "purchase repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "purchase repository query failed: {message}",
        /// The registrar order id is already recorded. A cross-instance
        /// duplicate race resolved in another instance's favour.
        DuplicateOrder { order_id: String } => "purchase order {order_id} already recorded",
    }
}

/// Port for purchase persistence. Rows are append-only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Append one purchase row.
    async fn insert(
        &self,
        new_purchase: &NewPurchase,
    ) -> Result<PurchaseRecord, PurchaseRepositoryError>;
}

/// Fixture implementation echoing back a synthetic row.
#[derive(Debug, Default)]
pub struct FixturePurchaseRepository;

#[async_trait]
impl PurchaseRepository for FixturePurchaseRepository {
    async fn insert(
        &self,
        new_purchase: &NewPurchase,
    ) -> Result<PurchaseRecord, PurchaseRepositoryError> {
        Ok(PurchaseRecord {
            id: Uuid::new_v4(),
            user_id: new_purchase.user_id,
            domain_id: new_purchase.domain_id,
            registrar: new_purchase.registrar,
            order_id: new_purchase.order_id.clone(),
            years: new_purchase.years,
            total_usd: new_purchase.total_usd,
            premium: new_purchase.premium,
            created_at: Utc::now(),
        })
    }
}
