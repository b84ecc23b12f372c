//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Repository implementations convert
//! between these rows and domain types, keeping Diesel confined to the
//! outbound adapter layer.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::schema::{api_keys, audit_logs, daily_spend, domains, idempotency_keys, purchases, users};

/// Row struct for reading users.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    #[expect(dead_code, reason = "schema field read for completeness of the row type")]
    pub created_at: DateTime<Utc>,
}

/// Row struct for reading api keys.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = api_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[expect(dead_code, reason = "credential lookups join straight onto users")]
pub(crate) struct ApiKeyRow {
    pub id: Uuid,
    pub key: String,
    pub user_id: Uuid,
}

/// Row struct for reading domains.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = domains)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DomainRow {
    pub id: Uuid,
    pub name: String,
    pub user_id: Uuid,
    pub registrar: String,
    pub status: String,
    pub privacy: bool,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating domain rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = domains)]
pub(crate) struct NewDomainRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub user_id: Uuid,
    pub registrar: &'a str,
    pub status: &'a str,
    pub privacy: bool,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row struct for reading purchases.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = purchases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PurchaseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub domain_id: Uuid,
    pub registrar: String,
    pub order_id: String,
    pub years: i32,
    pub total_usd: Decimal,
    pub premium: bool,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for appending purchases.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = purchases)]
pub(crate) struct NewPurchaseRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub domain_id: Uuid,
    pub registrar: &'a str,
    pub order_id: &'a str,
    pub years: i32,
    pub total_usd: Decimal,
    pub premium: bool,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for appending audit entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_logs)]
pub(crate) struct NewAuditRow<'a> {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub verb: &'a str,
    pub payload_json: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Row struct for reading idempotency records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = idempotency_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct IdempotencyRow {
    pub key: String,
    pub digest: Vec<u8>,
    pub response_json: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for committing idempotency records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = idempotency_keys)]
pub(crate) struct NewIdempotencyRow<'a> {
    pub key: &'a str,
    pub digest: &'a [u8],
    pub response_json: &'a serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for spend upserts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = daily_spend)]
pub(crate) struct NewDailySpendRow<'a> {
    pub account_key: &'a str,
    pub day: DateTime<Utc>,
    pub total_usd: Decimal,
}
