//! PostgreSQL-backed `ApiKeyRepository` implementation using Diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{ApiKeyRepository, ApiKeyRepositoryError, AuthenticatedUser};

use super::models::UserRow;
use super::pool::{DbPool, PoolError};
use super::schema::{api_keys, users};

/// Diesel-backed implementation of the `ApiKeyRepository` port.
#[derive(Clone)]
pub struct DieselApiKeyRepository {
    pool: DbPool,
}

impl DieselApiKeyRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to port errors.
fn map_pool_error(error: PoolError) -> ApiKeyRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ApiKeyRepositoryError::connection(message)
        }
    }
}

#[async_trait]
impl ApiKeyRepository for DieselApiKeyRepository {
    async fn find_user_by_key(
        &self,
        key: &str,
    ) -> Result<Option<AuthenticatedUser>, ApiKeyRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<UserRow> = api_keys::table
            .inner_join(users::table)
            .filter(api_keys::key.eq(key))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| {
                debug!(error = %err, "api key lookup failed");
                ApiKeyRepositoryError::query(err.to_string())
            })?;

        Ok(row.map(|user| AuthenticatedUser {
            id: user.id,
            email: user.email,
        }))
    }
}
