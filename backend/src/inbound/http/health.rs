//! Health endpoint for load balancers and operators.
//!
//! Besides liveness, the payload surfaces the active registrar and whether
//! dry-run mode is on, so a misconfigured production instance (silently
//! simulating purchases) is visible at a glance.

use std::time::Instant;

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde_json::json;

use crate::domain::ports::Provider;

/// Process-level facts served by `/health`.
pub struct HealthState {
    started_at: Instant,
    dry_run: bool,
    provider: Provider,
}

impl HealthState {
    /// Capture the process start and the operational mode.
    pub fn new(dry_run: bool, provider: Provider) -> Self {
        Self {
            started_at: Instant::now(),
            dry_run,
            provider,
        }
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Whether mutating registrar calls are simulated.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Liveness probe with operational mode.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is alive"))
)]
#[get("/health")]
pub async fn health(state: web::Data<HealthState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.uptime_secs(),
        "dry_run": state.dry_run(),
        "provider": state.provider,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use serde_json::Value;

    #[actix_web::test]
    async fn health_reports_mode_and_uptime() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(HealthState::new(true, Provider::Porkbun)))
                .service(health),
        )
        .await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/health").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["provider"], "porkbun");
        assert!(body["uptime_secs"].is_u64());
        assert!(body["timestamp"].is_string());
    }
}
