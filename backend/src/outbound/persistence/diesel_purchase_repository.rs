//! PostgreSQL-backed `PurchaseRepository` implementation using Diesel.
//!
//! The unique index on `order_id` is load-bearing: when two instances race
//! the same registration, exactly one insert wins and the loser surfaces
//! `DuplicateOrder`.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    NewPurchase, Provider, PurchaseRecord, PurchaseRepository, PurchaseRepositoryError,
};

use super::models::{NewPurchaseRow, PurchaseRow};
use super::pool::{DbPool, PoolError};
use super::schema::purchases;

/// Diesel-backed implementation of the `PurchaseRepository` port.
#[derive(Clone)]
pub struct DieselPurchaseRepository {
    pool: DbPool,
}

impl DieselPurchaseRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to port errors.
fn map_pool_error(error: PoolError) -> PurchaseRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            PurchaseRepositoryError::connection(message)
        }
    }
}

/// Map Diesel errors to port errors, distinguishing the order-id race.
fn map_diesel_error(error: diesel::result::Error, order_id: &str) -> PurchaseRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    debug!(error = %error, "purchase repository operation failed");
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            PurchaseRepositoryError::duplicate_order(order_id)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            PurchaseRepositoryError::connection("database connection error")
        }
        other => PurchaseRepositoryError::query(other.to_string()),
    }
}

/// Convert a database row to a purchase record.
fn row_to_record(row: PurchaseRow) -> Result<PurchaseRecord, PurchaseRepositoryError> {
    let registrar = Provider::parse(&row.registrar).ok_or_else(|| {
        PurchaseRepositoryError::query(format!("unknown stored registrar {:?}", row.registrar))
    })?;
    let years = u8::try_from(row.years).map_err(|_| {
        PurchaseRepositoryError::query(format!("stored years {} out of range", row.years))
    })?;
    Ok(PurchaseRecord {
        id: row.id,
        user_id: row.user_id,
        domain_id: row.domain_id,
        registrar,
        order_id: row.order_id,
        years,
        total_usd: row.total_usd,
        premium: row.premium,
        created_at: row.created_at,
    })
}

#[async_trait]
impl PurchaseRepository for DieselPurchaseRepository {
    async fn insert(
        &self,
        new_purchase: &NewPurchase,
    ) -> Result<PurchaseRecord, PurchaseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewPurchaseRow {
            id: Uuid::new_v4(),
            user_id: new_purchase.user_id,
            domain_id: new_purchase.domain_id,
            registrar: new_purchase.registrar.as_str(),
            order_id: &new_purchase.order_id,
            years: i32::from(new_purchase.years),
            total_usd: new_purchase.total_usd,
            premium: new_purchase.premium,
            created_at: Utc::now(),
        };

        let row: PurchaseRow = diesel::insert_into(purchases::table)
            .values(&new_row)
            .returning(PurchaseRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, &new_purchase.order_id))?;

        row_to_record(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    #[test]
    fn unique_violations_surface_the_order_id() {
        let err = map_diesel_error(
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                Box::new("duplicate key".to_string()),
            ),
            "PB-1881",
        );
        assert_eq!(err, PurchaseRepositoryError::duplicate_order("PB-1881"));
    }

    #[test]
    fn other_errors_map_to_query_errors() {
        let err = map_diesel_error(DieselError::NotFound, "PB-1881");
        assert!(matches!(err, PurchaseRepositoryError::Query { .. }));
    }
}
