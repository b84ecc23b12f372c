//! Port abstraction for the durable idempotency ledger.
//!
//! Adapters provide storage that survives restarts; the purchase pipeline
//! relies on it for exactly-once semantics under client retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::idempotency::{BeginOutcome, IdemRecord, PurchaseKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised by idempotency ledger adapters.
    pub enum IdempotencyStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "idempotency ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "idempotency ledger query failed: {message}",
        /// Stored response could not be encoded or decoded.
        Serialization { message: String } => "idempotency ledger serialization failed: {message}",
    }
}

/// Port for idempotency key reservation and replay.
///
/// The contract mirrors the purchase pipeline's three touch points: reserve
/// before the guarded region, commit on success, delete on failure. A
/// non-expired row always carries a completed response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Reserve `key` for this attempt.
    ///
    /// Returns [`BeginOutcome::Existing`] when a live record is present; the
    /// caller compares digests to decide between replay and rejection. Any
    /// expired row encountered under the key is deleted as a side effect.
    async fn begin(
        &self,
        key: &PurchaseKey,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, IdempotencyStoreError>;

    /// Persist a completed response for replay until `record.expires_at`.
    async fn commit(&self, record: &IdemRecord) -> Result<(), IdempotencyStoreError>;

    /// Clear `key` so a client retry can run the pipeline again.
    async fn fail(&self, key: &PurchaseKey) -> Result<(), IdempotencyStoreError>;

    /// Remove records whose TTL elapsed before `now`. Returns the number of
    /// rows deleted.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError>;
}

/// Fixture implementation: every key is fresh, nothing is stored.
///
/// Use in tests where idempotency behaviour is not under test.
#[derive(Debug, Default)]
pub struct FixtureIdempotencyStore;

#[async_trait]
impl IdempotencyStore for FixtureIdempotencyStore {
    async fn begin(
        &self,
        _key: &PurchaseKey,
        _now: DateTime<Utc>,
    ) -> Result<BeginOutcome, IdempotencyStoreError> {
        Ok(BeginOutcome::Reserved)
    }

    async fn commit(&self, _record: &IdemRecord) -> Result<(), IdempotencyStoreError> {
        Ok(())
    }

    async fn fail(&self, _key: &PurchaseKey) -> Result<(), IdempotencyStoreError> {
        Ok(())
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainName;
    use crate::domain::idempotency::ClientKey;

    #[tokio::test]
    async fn fixture_store_always_reserves() {
        let store = FixtureIdempotencyStore;
        let domain = DomainName::parse("example.com").expect("valid name");
        let key = PurchaseKey::for_purchase(&domain, &ClientKey::random());

        let outcome = store
            .begin(&key, Utc::now())
            .await
            .expect("fixture begin succeeds");
        assert_eq!(outcome, BeginOutcome::Reserved);
    }

    #[tokio::test]
    async fn fixture_store_sweeps_nothing() {
        let store = FixtureIdempotencyStore;
        assert_eq!(store.sweep_expired(Utc::now()).await.expect("sweep"), 0);
    }
}
