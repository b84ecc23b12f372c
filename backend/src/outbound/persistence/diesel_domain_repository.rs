//! PostgreSQL-backed `DomainRepository` implementation using Diesel.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::DomainName;
use crate::domain::ports::{
    DomainRecord, DomainRepository, DomainRepositoryError, DomainStatus, NewDomain, Provider,
};

use super::models::{DomainRow, NewDomainRow};
use super::pool::{DbPool, PoolError};
use super::schema::domains;

/// Diesel-backed implementation of the `DomainRepository` port.
#[derive(Clone)]
pub struct DieselDomainRepository {
    pool: DbPool,
}

impl DieselDomainRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to port errors.
fn map_pool_error(error: PoolError) -> DomainRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            DomainRepositoryError::connection(message)
        }
    }
}

/// Map Diesel errors to port errors.
fn map_diesel_error(error: diesel::result::Error) -> DomainRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    debug!(error = %error, "domain repository operation failed");
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DomainRepositoryError::connection("database connection error")
        }
        other => DomainRepositoryError::query(other.to_string()),
    }
}

/// Convert a database row to a domain record.
fn row_to_record(row: DomainRow) -> Result<DomainRecord, DomainRepositoryError> {
    let name = DomainName::parse(&row.name).map_err(|err| {
        DomainRepositoryError::query(format!("invalid stored domain name {:?}: {err}", row.name))
    })?;
    let registrar = Provider::parse(&row.registrar).ok_or_else(|| {
        DomainRepositoryError::query(format!("unknown stored registrar {:?}", row.registrar))
    })?;
    let status = DomainStatus::parse(&row.status).ok_or_else(|| {
        DomainRepositoryError::query(format!("unknown stored status {:?}", row.status))
    })?;
    Ok(DomainRecord {
        id: row.id,
        name,
        user_id: row.user_id,
        registrar,
        status,
        privacy: row.privacy,
        auto_renew: row.auto_renew,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl DomainRepository for DieselDomainRepository {
    async fn upsert_purchased(
        &self,
        new_domain: &NewDomain,
    ) -> Result<DomainRecord, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let now = Utc::now();
        let new_row = NewDomainRow {
            id: Uuid::new_v4(),
            name: new_domain.name.as_str(),
            user_id: new_domain.user_id,
            registrar: new_domain.registrar.as_str(),
            status: DomainStatus::Purchased.as_str(),
            privacy: new_domain.privacy,
            auto_renew: new_domain.auto_renew,
            created_at: now,
            updated_at: now,
        };

        let row: DomainRow = diesel::insert_into(domains::table)
            .values(&new_row)
            .on_conflict(domains::name)
            .do_update()
            .set((
                domains::user_id.eq(new_row.user_id),
                domains::registrar.eq(new_row.registrar),
                domains::status.eq(new_row.status),
                domains::privacy.eq(new_row.privacy),
                domains::updated_at.eq(now),
            ))
            .returning(DomainRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        row_to_record(row)
    }

    async fn mark_dns_applied(&self, id: Uuid) -> Result<(), DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(domains::table.filter(domains::id.eq(id)))
            .set((
                domains::status.eq(DomainStatus::DnsApplied.as_str()),
                domains::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(DomainRepositoryError::query(format!(
                "no domain row with id {id}"
            )));
        }
        Ok(())
    }

    async fn find_by_name(
        &self,
        name: &DomainName,
    ) -> Result<Option<DomainRecord>, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<DomainRow> = domains::table
            .filter(domains::name.eq(name.as_str()))
            .select(DomainRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(status: &str, registrar: &str) -> DomainRow {
        let now = Utc::now();
        DomainRow {
            id: Uuid::new_v4(),
            name: "example.com".to_owned(),
            user_id: Uuid::new_v4(),
            registrar: registrar.to_owned(),
            status: status.to_owned(),
            privacy: true,
            auto_renew: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn valid_rows_convert() {
        let record = row_to_record(row("DNS_APPLIED", "porkbun")).expect("row converts");
        assert_eq!(record.status, DomainStatus::DnsApplied);
        assert_eq!(record.registrar, Provider::Porkbun);
    }

    #[test]
    fn unknown_status_text_is_a_query_error() {
        let err = row_to_record(row("SEIZED", "porkbun")).expect_err("status fails");
        assert!(err.to_string().contains("SEIZED"));
    }

    #[test]
    fn unknown_registrar_text_is_a_query_error() {
        let err = row_to_record(row("PURCHASED", "godaddy")).expect_err("registrar fails");
        assert!(err.to_string().contains("godaddy"));
    }
}
