//! End-to-end purchase pipeline scenarios against in-memory adapters.
//!
//! These tests exercise the whole guarded region — idempotency ledger,
//! keyed mutex, drift gate, persistence, DNS provisioning, spend ledger —
//! with real interleavings and no database.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use backend::domain::idempotency::{ClientKey, IdempotencyConfig};
use backend::domain::ports::{
    AuthenticatedUser, NoOpPurchaseMetrics, Quote, RegistrantContact, SpendLedger, utc_day,
};
use backend::domain::{
    DomainName, ErrorKind, NameserverMode, PurchaseLimits, PurchaseOutcome, PurchaseRequest,
    PurchaseService, PurchaseServiceDeps, TldAllowlist,
};
use backend::test_support::{
    FixedClock, InMemoryDomainRepository, InMemoryIdempotencyStore, InMemoryPurchaseRepository,
    InMemorySpendLedger, RecordingAuditLog, ScriptedRegistrarDriver,
};

fn usd(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn contact() -> RegistrantContact {
    RegistrantContact {
        first_name: "Ada".to_owned(),
        last_name: "Winston".to_owned(),
        email: "ops@example.net".to_owned(),
        phone: "+1.5555550100".to_owned(),
        address1: "1 Main St".to_owned(),
        city: "Springfield".to_owned(),
        state: "IL".to_owned(),
        zip: "62701".to_owned(),
        country: "US".to_owned(),
    }
}

fn buyer() -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::from_u128(11),
        email: "buyer@example.net".to_owned(),
    }
}

fn request(domain: &str, key: &str) -> PurchaseRequest {
    PurchaseRequest {
        domain: DomainName::parse(domain).expect("valid name"),
        years: 1,
        whois_privacy: true,
        allow_premium: false,
        allow_unicode: false,
        nameserver_mode: NameserverMode::Registrar,
        nameservers: Vec::new(),
        dns_template_id: None,
        quoted_total_usd: usd(1200),
        client_key: ClientKey::new(key).expect("valid key"),
    }
}

struct World {
    driver: Arc<ScriptedRegistrarDriver>,
    idempotency: Arc<InMemoryIdempotencyStore>,
    spend: Arc<InMemorySpendLedger>,
    domains: Arc<InMemoryDomainRepository>,
    purchases: Arc<InMemoryPurchaseRepository>,
    audit: Arc<RecordingAuditLog>,
    service: Arc<PurchaseService>,
}

fn world_with(driver: ScriptedRegistrarDriver) -> World {
    let driver = Arc::new(driver);
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());
    let spend = Arc::new(InMemorySpendLedger::new());
    let domains = Arc::new(InMemoryDomainRepository::new());
    let purchases = Arc::new(InMemoryPurchaseRepository::new());
    let audit = Arc::new(RecordingAuditLog::new());
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap();

    let service = Arc::new(PurchaseService::new(
        PurchaseServiceDeps {
            registrar: driver.clone(),
            idempotency: idempotency.clone(),
            spend: spend.clone(),
            domains: domains.clone(),
            purchases: purchases.clone(),
            audit: audit.clone(),
            metrics: Arc::new(NoOpPurchaseMetrics),
            clock: Arc::new(FixedClock(now)),
        },
        TldAllowlist::default(),
        PurchaseLimits::default(),
        IdempotencyConfig::default(),
        contact(),
    ));

    World {
        driver,
        idempotency,
        spend,
        domains,
        purchases,
        audit,
        service,
    }
}

fn world() -> World {
    world_with(ScriptedRegistrarDriver::quoting(usd(1200)))
}

#[tokio::test]
async fn concurrent_duplicates_register_exactly_once() {
    let world = world();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = world.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .purchase(
                    &buyer(),
                    request("example.com", "550e8400-e29b-41d4-a716-446655440000"),
                )
                .await
                .expect("every duplicate succeeds")
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.expect("task completes").body().clone());
    }

    assert_eq!(
        world.driver.register_calls(),
        1,
        "exactly one registrar call across all duplicates"
    );
    assert_eq!(world.purchases.len(), 1, "exactly one purchase row");
    let first = &bodies[0];
    assert!(
        bodies.iter().all(|body| body == first),
        "every caller observes the identical response body"
    );

    // Spend recorded once, not eight times.
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap();
    let spent = world
        .spend
        .total(&buyer().account_key(), utc_day(now))
        .await
        .expect("ledger read");
    assert_eq!(spent, usd(1200));
}

#[tokio::test]
async fn sequential_retry_replays_the_stored_body() {
    let world = world();
    let key = "6f9619ff-8b86-4d01-b42d-00cf4fc964ff";

    let first = world
        .service
        .purchase(&buyer(), request("example.com", key))
        .await
        .expect("first attempt commits");
    let second = world
        .service
        .purchase(&buyer(), request("example.com", key))
        .await
        .expect("retry succeeds");

    assert!(matches!(first, PurchaseOutcome::Completed(_)));
    let PurchaseOutcome::Replayed(body) = second else {
        panic!("retry must replay, not re-run");
    };
    assert_eq!(&body, first.body());
    assert_eq!(world.driver.register_calls(), 1);
}

#[tokio::test]
async fn same_key_different_intent_is_conflict_without_side_effects() {
    let world = world();
    let key = "6f9619ff-8b86-4d01-b42d-00cf4fc964ff";

    world
        .service
        .purchase(&buyer(), request("example.com", key))
        .await
        .expect("first attempt commits");

    let mut altered = request("example.com", key);
    altered.years = 2;
    let err = world
        .service
        .purchase(&buyer(), altered)
        .await
        .expect_err("different digest must conflict");
    assert_eq!(err.kind(), ErrorKind::IdempotencyMismatch);
    assert_eq!(world.driver.register_calls(), 1, "no second registrar call");
    assert_eq!(world.purchases.len(), 1);
}

#[tokio::test]
async fn price_drift_leaves_no_purchase_behind() {
    let provisional = Quote {
        registration_price_usd: usd(1200),
        icann_fee_usd: usd(18),
        privacy_price_usd: Decimal::ZERO,
        total_usd: usd(1200),
        premium: false,
    };
    let world = world_with(ScriptedRegistrarDriver::quoting(usd(1300)).push_quote(provisional));

    let err = world
        .service
        .purchase(
            &buyer(),
            request("example.com", "550e8400-e29b-41d4-a716-446655440000"),
        )
        .await
        .expect_err("drifted quote must abort");

    assert_eq!(err.kind(), ErrorKind::PriceDrift);
    assert_eq!(err.details().expect("details")["drift"], "1.00");
    assert!(world.purchases.is_empty());
    assert!(
        world
            .domains
            .get(&DomainName::parse("example.com").unwrap())
            .is_none()
    );
    assert!(world.idempotency.is_empty(), "slot cleared for retry");
}

#[tokio::test]
async fn daily_cap_rejection_reports_remaining() {
    let world = world();
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap();
    world
        .spend
        .seed(&buyer().account_key(), utc_day(now), usd(499_000));

    let mut req = request("example.com", "550e8400-e29b-41d4-a716-446655440000");
    req.quoted_total_usd = usd(2_000);
    let err = world
        .service
        .purchase(&buyer(), req)
        .await
        .expect_err("cap breached");

    assert_eq!(err.kind(), ErrorKind::DailyCapExceeded);
    assert_eq!(err.details().expect("details")["remaining"], "10.00");
    assert_eq!(world.driver.register_calls(), 0);
}

#[tokio::test]
async fn failed_attempt_can_be_retried_after_cleanup() {
    // First attempt drifts and fails; the fresh default quote then matches,
    // so the retry with the same key succeeds.
    let drifted = Quote {
        registration_price_usd: usd(1300),
        icann_fee_usd: usd(18),
        privacy_price_usd: Decimal::ZERO,
        total_usd: usd(1300),
        premium: false,
    };
    let matching = Quote {
        registration_price_usd: usd(1200),
        icann_fee_usd: usd(18),
        privacy_price_usd: Decimal::ZERO,
        total_usd: usd(1200),
        premium: false,
    };
    let world = world_with(
        ScriptedRegistrarDriver::quoting(usd(1200))
            .push_quote(matching)
            .push_quote(drifted),
    );
    let key = "6f9619ff-8b86-4d01-b42d-00cf4fc964ff";

    let err = world
        .service
        .purchase(&buyer(), request("example.com", key))
        .await
        .expect_err("first attempt drifts");
    assert_eq!(err.kind(), ErrorKind::PriceDrift);

    let outcome = world
        .service
        .purchase(&buyer(), request("example.com", key))
        .await
        .expect("retry succeeds after cleanup");
    assert!(matches!(outcome, PurchaseOutcome::Completed(_)));
    assert_eq!(world.purchases.len(), 1);
    assert_eq!(
        world.audit.verbs().len(),
        2,
        "one BUY_FAIL and one BUY_SUCCESS entry"
    );
}
