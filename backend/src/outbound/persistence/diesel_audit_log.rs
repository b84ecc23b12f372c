//! PostgreSQL-backed `AuditLog` implementation using Diesel.

use async_trait::async_trait;
use chrono::Utc;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{AuditLog, AuditLogError, AuditVerb};

use super::models::NewAuditRow;
use super::pool::{DbPool, PoolError};
use super::schema::audit_logs;

/// Diesel-backed implementation of the `AuditLog` port. Append-only.
#[derive(Clone)]
pub struct DieselAuditLog {
    pool: DbPool,
}

impl DieselAuditLog {
    /// Create a new log with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to port errors.
fn map_pool_error(error: PoolError) -> AuditLogError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            AuditLogError::connection(message)
        }
    }
}

#[async_trait]
impl AuditLog for DieselAuditLog {
    async fn record(
        &self,
        user_id: Option<Uuid>,
        verb: AuditVerb,
        payload: &serde_json::Value,
    ) -> Result<(), AuditLogError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewAuditRow {
            id: Uuid::new_v4(),
            user_id,
            verb: verb.as_str(),
            payload_json: payload,
            created_at: Utc::now(),
        };

        diesel::insert_into(audit_logs::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                debug!(error = %err, "audit append failed");
                AuditLogError::query(err.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_map_to_connection_errors() {
        let err = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(err, AuditLogError::Connection { .. }));
    }
}
