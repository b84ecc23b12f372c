//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly; Diesel uses
//! them for compile-time query validation and type-safe SQL generation.
//! Regenerate with `diesel print-schema` when migrations change.

diesel::table! {
    /// Registered account owners.
    users (id) {
        id -> Uuid,
        /// Unique contact address used as the account identity.
        email -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Opaque bearer credentials, many per user.
    api_keys (id) {
        id -> Uuid,
        /// Unique opaque token presented as `Authorization: Bearer`.
        key -> Varchar,
        user_id -> Uuid,
    }
}

diesel::table! {
    /// Domains this gateway has registered. Names are globally unique.
    domains (id) {
        id -> Uuid,
        name -> Varchar,
        user_id -> Uuid,
        registrar -> Varchar,
        /// Lifecycle projection: AVAILABLE, PURCHASED, DNS_APPLIED, ERROR.
        status -> Varchar,
        privacy -> Bool,
        auto_renew -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only purchase log. `order_id` uniqueness is the last line of
    /// defence against cross-instance duplicate registration.
    purchases (id) {
        id -> Uuid,
        user_id -> Uuid,
        domain_id -> Uuid,
        registrar -> Varchar,
        order_id -> Varchar,
        years -> Int4,
        total_usd -> Numeric,
        premium -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only audit trail; never read by the pipelines.
    audit_logs (id) {
        id -> Uuid,
        user_id -> Nullable<Uuid>,
        verb -> Varchar,
        payload_json -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Durable idempotency ledger: completed responses keyed by
    /// `buy:{domain}:{client-uuid}` until expiry.
    idempotency_keys (key) {
        key -> Varchar,
        digest -> Bytea,
        response_json -> Jsonb,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Per-(account, UTC day) spend accumulator.
    daily_spend (account_key, day) {
        account_key -> Varchar,
        /// Midnight UTC of the bucketed day.
        day -> Timestamptz,
        total_usd -> Numeric,
    }
}

diesel::joinable!(api_keys -> users (user_id));
diesel::joinable!(purchases -> users (user_id));
diesel::joinable!(purchases -> domains (domain_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    api_keys,
    domains,
    purchases,
    audit_logs,
    idempotency_keys,
    daily_spend,
);
