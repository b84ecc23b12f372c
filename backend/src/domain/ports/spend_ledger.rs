//! Port abstraction for the per-account daily spend ledger.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;

use super::define_port_error;

define_port_error! {
    /// Errors raised by spend ledger adapters.
    pub enum SpendLedgerError {
        /// Store connection could not be established.
        Connection { message: String } => "spend ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "spend ledger query failed: {message}",
    }
}

/// Truncate a timestamp to the enclosing UTC day (midnight).
pub fn utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .expect("midnight of an existing date is unambiguous")
}

/// Whether spending `amount` on top of `total` breaches `cap`.
pub fn would_exceed(total: Decimal, amount: Decimal, cap: Decimal) -> bool {
    total + amount > cap
}

/// Budget left under `cap`, floored at zero.
pub fn remaining(total: Decimal, cap: Decimal) -> Decimal {
    (cap - total).max(Decimal::ZERO)
}

/// Port for accumulating USD spend per `(account, UTC day)`.
///
/// `add` is the only write path and must stay correct under concurrent
/// purchases (adapter-side atomic upsert increment). Reads may race writes;
/// the pipeline's per-transaction cap bounds the resulting overshoot to one
/// transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpendLedger: Send + Sync {
    /// Total recorded spend for the account on `day`. Zero when absent.
    async fn total(
        &self,
        account_key: &str,
        day: DateTime<Utc>,
    ) -> Result<Decimal, SpendLedgerError>;

    /// Atomically add `amount` to the account's total for `day`.
    async fn add(
        &self,
        account_key: &str,
        day: DateTime<Utc>,
        amount: Decimal,
    ) -> Result<(), SpendLedgerError>;

    /// Delete rows for days strictly before `cutoff`. Returns rows removed.
    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SpendLedgerError>;
}

/// Fixture implementation reporting zero spend and accepting all writes.
#[derive(Debug, Default)]
pub struct FixtureSpendLedger;

#[async_trait]
impl SpendLedger for FixtureSpendLedger {
    async fn total(
        &self,
        _account_key: &str,
        _day: DateTime<Utc>,
    ) -> Result<Decimal, SpendLedgerError> {
        Ok(Decimal::ZERO)
    }

    async fn add(
        &self,
        _account_key: &str,
        _day: DateTime<Utc>,
        _amount: Decimal,
    ) -> Result<(), SpendLedgerError> {
        Ok(())
    }

    async fn sweep_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64, SpendLedgerError> {
        Ok(0)
    }
}
