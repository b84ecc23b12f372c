//! Server construction: dependency wiring, middleware, background sweeps.

pub mod config;

pub use config::{AppConfig, ConfigError};

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{App, HttpServer, web};
use actix_web_prom::PrometheusMetricsBuilder;
use chrono::Utc;
use mockable::DefaultClock;
use tracing::{info, warn};

use crate::domain::idempotency::IdempotencyConfig;
use crate::domain::ports::{IdempotencyStore, Provider, RegistrarDriver, SpendLedger};
use crate::domain::rate_limit::SWEEP_INTERVAL;
use crate::domain::{
    PurchaseService, PurchaseServiceDeps, RateLimiter, SearchService, StatusService,
};
use crate::inbound::http::health::{HealthState, health};
use crate::inbound::http::state::{HttpState, HttpStatePorts};
use crate::inbound::http::{buy, not_found, search, status};
use crate::middleware::trace::Trace;
use crate::outbound::metrics::PrometheusPurchaseMetrics;
use crate::outbound::persistence::{
    DbPool, DieselApiKeyRepository, DieselAuditLog, DieselDomainRepository,
    DieselIdempotencyStore, DieselPurchaseRepository, DieselSpendLedger, PoolConfig,
};
use crate::outbound::registrar::{
    NamecheapCredentials, NamecheapDriver, PorkbunCredentials, PorkbunDriver,
};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);

/// Build the registrar driver selected by configuration.
///
/// Dry-run instances may run without credentials; the placeholders are never
/// sent to a mutating endpoint.
fn build_driver(config: &AppConfig) -> Result<Arc<dyn RegistrarDriver>, std::io::Error> {
    let driver: Arc<dyn RegistrarDriver> = match config.provider {
        Provider::Porkbun => {
            let credentials = config.porkbun.clone().unwrap_or(PorkbunCredentials {
                api_key: String::new(),
                secret_key: String::new(),
            });
            Arc::new(
                PorkbunDriver::new(credentials, config.dry_run)
                    .map_err(|err| std::io::Error::other(err.to_string()))?,
            )
        }
        Provider::Namecheap => {
            let credentials = config.namecheap.clone().unwrap_or(NamecheapCredentials {
                api_user: String::new(),
                api_key: String::new(),
                username: String::new(),
                client_ip: String::new(),
            });
            Arc::new(
                NamecheapDriver::new(credentials, config.dry_run)
                    .map_err(|err| std::io::Error::other(err.to_string()))?,
            )
        }
    };
    Ok(driver)
}

/// Periodic upkeep: expired idempotency rows and aged spend rows.
fn spawn_store_maintenance(
    idempotency: Arc<dyn IdempotencyStore>,
    spend: Arc<dyn SpendLedger>,
    retention_days: i64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match idempotency.sweep_expired(now).await {
                Ok(deleted) if deleted > 0 => info!(deleted, "swept idempotency ledger"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "idempotency sweep failed"),
            }
            let cutoff = now - chrono::Duration::days(retention_days);
            match spend.sweep_older_than(cutoff).await {
                Ok(deleted) if deleted > 0 => info!(deleted, "swept spend ledger"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "spend sweep failed"),
            }
        }
    });
}

fn spawn_rate_limiter_sweep(rate_limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = rate_limiter.sweep_idle();
            if evicted > 0 {
                info!(evicted, "evicted idle rate-limit keys");
            }
        }
    });
}

#[cfg(debug_assertions)]
async fn openapi_json() -> actix_web::HttpResponse {
    use utoipa::OpenApi;
    actix_web::HttpResponse::Ok().json(crate::doc::ApiDoc::openapi())
}

/// Wire everything and drive the listener until shutdown.
///
/// # Errors
///
/// Propagates socket binding and pool construction failures.
pub async fn run(config: AppConfig) -> std::io::Result<()> {
    let pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .map_err(|err| std::io::Error::other(err.to_string()))?;

    let driver = build_driver(&config)?;
    if config.dry_run {
        warn!("dry-run mode is ON: registrar mutations are simulated");
    }

    let prometheus = PrometheusMetricsBuilder::new("gateway")
        .endpoint("/metrics")
        .build()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    let purchase_metrics = PrometheusPurchaseMetrics::new(&prometheus.registry)
        .map_err(|err| std::io::Error::other(err.to_string()))?;

    let idempotency: Arc<dyn IdempotencyStore> =
        Arc::new(DieselIdempotencyStore::new(pool.clone()));
    let spend: Arc<dyn SpendLedger> = Arc::new(DieselSpendLedger::new(pool.clone()));
    let domains = Arc::new(DieselDomainRepository::new(pool.clone()));
    let purchases = Arc::new(DieselPurchaseRepository::new(pool.clone()));
    let audit = Arc::new(DieselAuditLog::new(pool.clone()));
    let api_keys = Arc::new(DieselApiKeyRepository::new(pool.clone()));

    let purchase = Arc::new(PurchaseService::new(
        PurchaseServiceDeps {
            registrar: driver.clone(),
            idempotency: idempotency.clone(),
            spend: spend.clone(),
            domains: domains.clone(),
            purchases: purchases.clone(),
            audit: audit.clone(),
            metrics: Arc::new(purchase_metrics),
            clock: Arc::new(DefaultClock),
        },
        config.allowlist.clone(),
        config.limits,
        IdempotencyConfig::from_env(),
        config.contact.clone(),
    ));
    let search_service = Arc::new(SearchService::new(
        driver.clone(),
        audit.clone(),
        config.allowlist.clone(),
        config.max_domains_per_search,
    ));
    let status_service = Arc::new(StatusService::new(domains.clone(), config.allowlist.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));

    spawn_rate_limiter_sweep(rate_limiter.clone());
    spawn_store_maintenance(idempotency.clone(), spend.clone(), config.spend_retention_days);

    let http_state = web::Data::new(HttpState::new(HttpStatePorts {
        api_keys,
        purchase,
        search: search_service,
        status: status_service,
        rate_limiter,
    }));
    let health_state = web::Data::new(HealthState::new(config.dry_run, config.provider));

    let port = config.port;
    info!(port, provider = %config.provider, "starting gateway");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]);

        let app = App::new()
            .app_data(http_state.clone())
            .app_data(health_state.clone())
            .wrap(prometheus.clone())
            .wrap(cors)
            .wrap(Trace)
            .service(health)
            .service(buy::buy)
            .service(search::search)
            .service(status::status)
            .default_service(web::route().to(not_found));

        #[cfg(debug_assertions)]
        let app = app.route("/api-docs/openapi.json", web::get().to(openapi_json));

        app
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
