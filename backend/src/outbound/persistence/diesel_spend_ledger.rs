//! PostgreSQL-backed `SpendLedger` implementation using Diesel.
//!
//! `add` is a single `INSERT .. ON CONFLICT .. DO UPDATE` incrementing the
//! stored total in place, so concurrent purchases for one account land
//! correctly without application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::ports::{SpendLedger, SpendLedgerError};

use super::models::NewDailySpendRow;
use super::pool::{DbPool, PoolError};
use super::schema::daily_spend;

/// Diesel-backed implementation of the `SpendLedger` port.
#[derive(Clone)]
pub struct DieselSpendLedger {
    pool: DbPool,
}

impl DieselSpendLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to port errors.
fn map_pool_error(error: PoolError) -> SpendLedgerError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            SpendLedgerError::connection(message)
        }
    }
}

/// Map Diesel errors to port errors.
fn map_diesel_error(error: diesel::result::Error) -> SpendLedgerError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    debug!(error = %error, "spend ledger operation failed");
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            SpendLedgerError::connection("database connection error")
        }
        other => SpendLedgerError::query(other.to_string()),
    }
}

#[async_trait]
impl SpendLedger for DieselSpendLedger {
    async fn total(
        &self,
        account_key: &str,
        day: DateTime<Utc>,
    ) -> Result<Decimal, SpendLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let total: Option<Decimal> = daily_spend::table
            .filter(daily_spend::account_key.eq(account_key))
            .filter(daily_spend::day.eq(day))
            .select(daily_spend::total_usd)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    async fn add(
        &self,
        account_key: &str,
        day: DateTime<Utc>,
        amount: Decimal,
    ) -> Result<(), SpendLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewDailySpendRow {
            account_key,
            day,
            total_usd: amount,
        };

        // Atomic increment on conflict; both sides of a concurrent race are
        // serialized by the row lock the update takes.
        diesel::insert_into(daily_spend::table)
            .values(&new_row)
            .on_conflict((daily_spend::account_key, daily_spend::day))
            .do_update()
            .set(daily_spend::total_usd.eq(daily_spend::total_usd + amount))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SpendLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(daily_spend::table.filter(daily_spend::day.lt(cutoff)))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        debug!(deleted, cutoff = %cutoff, "swept aged spend rows");
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_errors_map_to_connection_errors() {
        let err = map_pool_error(PoolError::build("bad dsn"));
        assert!(matches!(err, SpendLedgerError::Connection { .. }));
    }

    #[rstest]
    fn diesel_errors_map_to_query_errors() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, SpendLedgerError::Query { .. }));
    }
}
