//! Port abstraction for bearer-credential lookup.

use async_trait::async_trait;
use uuid::Uuid;

use super::define_port_error;

/// User resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

impl AuthenticatedUser {
    /// Rate-limit and spend-ledger key for this user.
    pub fn account_key(&self) -> String {
        self.id.to_string()
    }
}

define_port_error! {
    /// Errors raised by API key repository adapters.
    pub enum ApiKeyRepositoryError {
        /// Store connection could not be established.
        Connection { message: String } => "api key repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "api key repository query failed: {message}",
    }
}

/// Port resolving opaque API keys to users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Look up the owner of `key`. `None` when the key is unknown.
    async fn find_user_by_key(
        &self,
        key: &str,
    ) -> Result<Option<AuthenticatedUser>, ApiKeyRepositoryError>;
}

/// Fixture implementation rejecting every credential.
#[derive(Debug, Default)]
pub struct FixtureApiKeyRepository;

#[async_trait]
impl ApiKeyRepository for FixtureApiKeyRepository {
    async fn find_user_by_key(
        &self,
        _key: &str,
    ) -> Result<Option<AuthenticatedUser>, ApiKeyRepositoryError> {
        Ok(None)
    }
}
