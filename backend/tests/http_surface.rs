//! HTTP surface tests: routing, auth, error envelopes, rate limiting.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::http::header;
use actix_web::{App, test as actix_test, web};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use uuid::Uuid;

use backend::Trace;
use backend::domain::idempotency::{ClientKey, IdempotencyConfig};
use backend::domain::ports::{
    AuthenticatedUser, DomainRecord, DomainStatus, NoOpPurchaseMetrics, Provider,
    RegistrantContact,
};
use backend::domain::{
    DomainName, PurchaseLimits, PurchaseService, PurchaseServiceDeps, RateLimiter,
    RateLimiterConfig, SearchService, StatusService, TldAllowlist,
};
use backend::inbound::http::state::{HttpState, HttpStatePorts};
use backend::inbound::http::{buy, not_found, search, status};
use backend::test_support::{
    FixedClock, InMemoryApiKeyRepository, InMemoryDomainRepository, InMemoryIdempotencyStore,
    InMemoryPurchaseRepository, InMemorySpendLedger, RecordingAuditLog, ScriptedRegistrarDriver,
};

const API_KEY: &str = "gw_test_key_1";

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

struct World {
    state: HttpState,
    domains: Arc<InMemoryDomainRepository>,
    purchases: Arc<InMemoryPurchaseRepository>,
}

fn world_with(driver: ScriptedRegistrarDriver, rate_limit: RateLimiterConfig) -> World {
    let driver = Arc::new(driver);
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());
    let spend = Arc::new(InMemorySpendLedger::new());
    let domains = Arc::new(InMemoryDomainRepository::new());
    let purchases = Arc::new(InMemoryPurchaseRepository::new());
    let audit = Arc::new(RecordingAuditLog::new());
    let api_keys = Arc::new(InMemoryApiKeyRepository::new());
    api_keys.seed(API_KEY, AuthenticatedUser {
        id: Uuid::from_u128(11),
        email: "buyer@example.net".to_owned(),
    });
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().unwrap();

    let purchase = Arc::new(PurchaseService::new(
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
    let search_service = Arc::new(SearchService::new(
        driver.clone(),
        audit.clone(),
        TldAllowlist::default(),
        20,
    ));
    let status_service = Arc::new(StatusService::new(domains.clone(), TldAllowlist::default()));

    let state = HttpState::new(HttpStatePorts {
        api_keys,
        purchase,
        search: search_service,
        status: status_service,
        rate_limiter: Arc::new(RateLimiter::new(rate_limit)),
    });
    World {
        state,
        domains,
        purchases,
    }
}

fn world() -> World {
    world_with(
        ScriptedRegistrarDriver::quoting(usd(1200)),
        RateLimiterConfig::default(),
    )
}

macro_rules! test_app {
    ($world:expr) => {
        actix_test::init_service(
            App::new()
                .app_data(web::Data::new($world.state.clone()))
                .wrap(Trace)
                .service(buy::buy)
                .service(search::search)
                .service(status::status)
                .default_service(web::route().to(not_found)),
        )
        .await
    };
}

fn buy_body() -> Value {
    json!({
        "domain": "example.com",
        "years": 1,
        "whois_privacy": true,
        "quoted_total_usd": 12.00,
        "confirmation_code": "abcd",
        "idempotency_key": "550e8400-e29b-41d4-a716-446655440000",
    })
}

#[actix_web::test]
async fn buy_requires_a_bearer_credential() {
    let world = world();
    let app = test_app!(world);

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/buy")
            .set_json(buy_body())
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["status"], 401);
}

#[actix_web::test]
async fn buy_commits_and_identical_retry_replays() {
    let world = world();
    let app = test_app!(world);

    let first = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/buy")
            .insert_header((header::AUTHORIZATION, format!("Bearer {API_KEY}")))
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    let first_body: Value = actix_test::read_body_json(first).await;
    assert_eq!(first_body["order_id"], "PB-TEST-1");
    assert_eq!(first_body["charged_total_usd"], "12.00");
    assert_eq!(first_body["registrar"], "porkbun");
    assert_eq!(first_body["nameserver_mode"], "registrar");
    assert_eq!(first_body["dns_template_id"], "web-basic");

    let second = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/buy")
            .insert_header((header::AUTHORIZATION, format!("Bearer {API_KEY}")))
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_body: Value = actix_test::read_body_json(second).await;
    assert_eq!(second_body, first_body, "stored response replays verbatim");
    assert_eq!(world.purchases.len(), 1, "no duplicate purchase row");
}

#[actix_web::test]
async fn buy_with_reused_key_and_new_intent_conflicts() {
    let world = world();
    let app = test_app!(world);

    let first = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/buy")
            .insert_header((header::AUTHORIZATION, format!("Bearer {API_KEY}")))
            .set_json(buy_body())
            .to_request(),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let mut altered = buy_body();
    altered["years"] = json!(2);
    let second = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/buy")
            .insert_header((header::AUTHORIZATION, format!("Bearer {API_KEY}")))
            .set_json(altered)
            .to_request(),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = actix_test::read_body_json(second).await;
    assert_eq!(body["error"], "IdempotencyMismatch");
}

#[actix_web::test]
async fn search_rejects_all_cyrillic_candidates_without_opt_in() {
    let world = world();
    let app = test_app!(world);

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/search")
            .set_json(json!({ "candidates": ["аpple.com"] }))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["error"], "UnsafeLabel");
    assert_eq!(body["details"]["sample_reasons"][0], "NonAsciiNotAllowed");
}

#[actix_web::test]
async fn search_expands_a_prompt_across_tlds() {
    let world = world();
    let app = test_app!(world);

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/search")
            .set_json(json!({ "prompt": "AI chatbot", "tlds": ["com", "io"] }))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    let names: Vec<&str> = body["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|result| result["domain"].as_str().expect("domain string"))
        .collect();
    assert_eq!(names, ["ai-chatbot.com", "ai-chatbot.io"]);
}

#[actix_web::test]
async fn status_projection_is_stable_across_reads() {
    let world = world();
    let now = Utc::now();
    world.domains.seed(DomainRecord {
        id: Uuid::new_v4(),
        name: DomainName::parse("example.com").expect("valid name"),
        user_id: Uuid::from_u128(11),
        registrar: Provider::Porkbun,
        status: DomainStatus::DnsApplied,
        privacy: true,
        auto_renew: false,
        created_at: now,
        updated_at: now,
    });
    let app = test_app!(world);

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/status/example.com")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(actix_test::read_body_json::<Value, _>(response).await);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["state"], "dns_applied");
    assert_eq!(bodies[0]["registrar"], "porkbun");
}

#[actix_web::test]
async fn untracked_domains_answer_unknown() {
    let world = world();
    let app = test_app!(world);

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/status/nobody-owns-this.net")
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["state"], "unknown");
}

#[actix_web::test]
async fn exhausted_rate_limit_answers_429_with_retry_after() {
    let world = world_with(
        ScriptedRegistrarDriver::quoting(usd(1200)),
        RateLimiterConfig {
            requests_per_minute: 2,
            burst: 2,
        },
    );
    let app = test_app!(world);

    for _ in 0..2 {
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/status/example.com")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let rejected = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri("/status/example.com")
            .to_request(),
    )
    .await;
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = rejected
        .headers()
        .get("retry-after")
        .expect("Retry-After present")
        .to_str()
        .expect("ascii header")
        .parse()
        .expect("numeric header");
    assert!(retry_after >= 1 && retry_after <= 60);

    let body: Value = actix_test::read_body_json(rejected).await;
    assert_eq!(body["error"], "RateLimited");
    assert!(body["details"]["retryAfterSec"].is_u64());
}

#[actix_web::test]
async fn unknown_routes_use_the_error_envelope() {
    let world = world();
    let app = test_app!(world);

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::get().uri("/nope").to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["error"], "NotFound");
    assert_eq!(body["status"], 404);
}

#[actix_web::test]
async fn purchase_keys_scope_domain_and_client_uuid() {
    let key = ClientKey::new("550e8400-e29b-41d4-a716-446655440000").expect("valid key");
    let domain = DomainName::parse("example.com").expect("valid name");
    let purchase_key = backend::domain::idempotency::PurchaseKey::for_purchase(&domain, &key);
    assert_eq!(
        purchase_key.as_str(),
        "buy:example.com:550e8400-e29b-41d4-a716-446655440000"
    );
}
