//! PostgreSQL-backed `IdempotencyStore` implementation using Diesel.
//!
//! Durability lives here: a committed response survives process restarts so
//! a client retry after any crash replays the same body. Expired rows are
//! deleted opportunistically during `begin` and in bulk via
//! `sweep_expired`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::idempotency::{BeginOutcome, IdemRecord, PurchaseKey, RequestDigest};
use crate::domain::ports::{IdempotencyStore, IdempotencyStoreError};

use super::models::{IdempotencyRow, NewIdempotencyRow};
use super::pool::{DbPool, PoolError};
use super::schema::idempotency_keys;

/// Diesel-backed implementation of the `IdempotencyStore` port.
#[derive(Clone)]
pub struct DieselIdempotencyStore {
    pool: DbPool,
}

impl DieselIdempotencyStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to port errors.
fn map_pool_error(error: PoolError) -> IdempotencyStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            IdempotencyStoreError::connection(message)
        }
    }
}

/// Map Diesel errors to port errors.
fn map_diesel_error(error: diesel::result::Error) -> IdempotencyStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    debug!(error = %error, "idempotency ledger operation failed");
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            IdempotencyStoreError::connection("database connection error")
        }
        other => IdempotencyStoreError::query(other.to_string()),
    }
}

/// Convert a database row to a domain record.
fn row_to_record(row: IdempotencyRow) -> Result<IdemRecord, IdempotencyStoreError> {
    let digest = RequestDigest::try_from_bytes(&row.digest).map_err(|err| {
        IdempotencyStoreError::serialization(format!("corrupted digest in database: {err}"))
    })?;
    Ok(IdemRecord {
        key: PurchaseKey::from_stored(row.key),
        digest,
        response: row.response_json,
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

#[async_trait]
impl IdempotencyStore for DieselIdempotencyStore {
    async fn begin(
        &self,
        key: &PurchaseKey,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<IdempotencyRow> = idempotency_keys::table
            .filter(idempotency_keys::key.eq(key.as_str()))
            .select(IdempotencyRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        match row {
            None => Ok(BeginOutcome::Reserved),
            Some(row) if row.expires_at <= now => {
                diesel::delete(
                    idempotency_keys::table.filter(idempotency_keys::key.eq(key.as_str())),
                )
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;
                Ok(BeginOutcome::Reserved)
            }
            Some(row) => Ok(BeginOutcome::Existing(row_to_record(row)?)),
        }
    }

    async fn commit(&self, record: &IdemRecord) -> Result<(), IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewIdempotencyRow {
            key: record.key.as_str(),
            digest: record.digest.as_bytes(),
            response_json: &record.response,
            expires_at: record.expires_at,
            created_at: record.created_at,
        };

        diesel::insert_into(idempotency_keys::table)
            .values(&new_row)
            .on_conflict(idempotency_keys::key)
            .do_update()
            .set((
                idempotency_keys::digest.eq(new_row.digest),
                idempotency_keys::response_json.eq(new_row.response_json),
                idempotency_keys::expires_at.eq(new_row.expires_at),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn fail(&self, key: &PurchaseKey) -> Result<(), IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::delete(idempotency_keys::table.filter(idempotency_keys::key.eq(key.as_str())))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted =
            diesel::delete(idempotency_keys::table.filter(idempotency_keys::expires_at.le(now)))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;

        debug!(deleted, "swept expired idempotency records");
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn pool_errors_map_to_connection_errors() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, IdempotencyStoreError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn diesel_errors_map_to_query_errors() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, IdempotencyStoreError::Query { .. }));
    }

    #[test]
    fn rows_round_trip_into_records() {
        let now = Utc::now();
        let row = IdempotencyRow {
            key: "buy:example.com:550e8400-e29b-41d4-a716-446655440000".to_owned(),
            digest: vec![0xab; 32],
            response_json: json!({"order_id": "PB-1"}),
            expires_at: now + Duration::hours(1),
            created_at: now,
        };

        let record = row_to_record(row).expect("row converts");
        assert_eq!(
            record.key.as_str(),
            "buy:example.com:550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(record.digest.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn corrupted_digests_surface_as_serialization_errors() {
        let row = IdempotencyRow {
            key: "buy:example.com:x".to_owned(),
            digest: vec![1, 2, 3],
            response_json: json!({}),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };

        let err = row_to_record(row).expect_err("short digest fails");
        assert!(matches!(err, IdempotencyStoreError::Serialization { .. }));
    }
}
