//! USD money helpers shared by quoting, caps, and the spend ledger.
//!
//! Amounts are `rust_decimal::Decimal` rounded to two places. Price-drift
//! comparison uses absolute difference against a fixed tolerance so small
//! pricing races between quote and commit do not fail purchases.

use rust_decimal::Decimal;

/// Tolerated absolute difference between the client quote and the fresh
/// server quote, in USD.
pub fn drift_tolerance() -> Decimal {
    Decimal::new(50, 2)
}

/// Per-year ICANN fee applied to every registration, in USD.
pub fn icann_fee_per_year() -> Decimal {
    Decimal::new(18, 2)
}

/// Round an amount to two decimal places, away from zero on midpoints.
pub fn round_usd(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Absolute difference between two amounts.
pub fn drift(server_total: Decimal, client_total: Decimal) -> Decimal {
    (server_total - client_total).abs()
}

/// Whether the fresh server quote drifted beyond tolerance.
pub fn exceeds_drift_tolerance(server_total: Decimal, client_total: Decimal) -> bool {
    drift(server_total, client_total) > drift_tolerance()
}
