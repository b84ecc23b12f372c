//! Purchase endpoint.
//!
//! ```text
//! POST /buy  Register a domain with exactly-once semantics
//! ```
//!
//! Requires a bearer credential and a client-generated `idempotency_key`
//! (UUID v4). Retrying the identical request replays the stored response
//! verbatim; reusing the key with different parameters is a 409.

use actix_web::{HttpRequest, HttpResponse, post, web};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::idempotency::ClientKey;
use crate::domain::{DomainName, Error, NameserverMode, PurchaseOutcome, PurchaseRequest};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{rate_limit_key, require_identity};
use crate::inbound::http::error::rate_limited;
use crate::inbound::http::state::HttpState;

const MIN_YEARS: u8 = 1;
const MAX_YEARS: u8 = 10;
const MIN_CONFIRMATION_LEN: usize = 4;
const MAX_CONFIRMATION_LEN: usize = 100;

fn default_years() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

/// Purchase request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct BuyRequest {
    /// Domain to register, `label.tld`.
    pub domain: String,
    /// Registration term in years, 1..=10.
    #[serde(default = "default_years")]
    pub years: u8,
    /// Whether to request WHOIS privacy.
    #[serde(default = "default_true")]
    pub whois_privacy: bool,
    /// Opt in to premium-priced names.
    #[serde(default)]
    pub allow_premium: bool,
    /// Opt in to punycode (`xn--`) labels.
    #[serde(default)]
    pub allow_unicode: bool,
    /// Who provisions DNS after registration.
    #[serde(default)]
    pub nameserver_mode: NameserverModeDto,
    /// Nameservers for `custom` mode, 2..=13 hosts.
    #[serde(default)]
    pub nameservers: Option<Vec<String>>,
    /// DNS template id for `registrar` mode; defaults to `web-basic`.
    #[serde(default)]
    pub dns_template_id: Option<String>,
    /// The price the client saw; drift beyond 0.50 USD aborts.
    pub quoted_total_usd: Decimal,
    /// Human confirmation string, 4..=100 characters.
    pub confirmation_code: String,
    /// Client-generated UUID identifying this purchase attempt.
    pub idempotency_key: String,
}

/// Wire form of [`NameserverMode`].
#[derive(Debug, Clone, Copy, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NameserverModeDto {
    #[default]
    Registrar,
    Custom,
}

impl From<NameserverModeDto> for NameserverMode {
    fn from(value: NameserverModeDto) -> Self {
        match value {
            NameserverModeDto::Registrar => NameserverMode::Registrar,
            NameserverModeDto::Custom => NameserverMode::Custom,
        }
    }
}

fn validate(body: BuyRequest) -> Result<PurchaseRequest, Error> {
    let domain =
        DomainName::parse(&body.domain).map_err(|err| Error::validation(err.to_string()))?;

    if !(MIN_YEARS..=MAX_YEARS).contains(&body.years) {
        return Err(Error::validation(format!(
            "years must be within [{MIN_YEARS}, {MAX_YEARS}]"
        )));
    }
    if body.quoted_total_usd <= Decimal::ZERO {
        return Err(Error::validation("quoted_total_usd must be positive"));
    }
    let confirmation_len = body.confirmation_code.chars().count();
    if !(MIN_CONFIRMATION_LEN..=MAX_CONFIRMATION_LEN).contains(&confirmation_len) {
        return Err(Error::validation(format!(
            "confirmation_code length must be within [{MIN_CONFIRMATION_LEN}, {MAX_CONFIRMATION_LEN}]"
        )));
    }
    let client_key = ClientKey::new(&body.idempotency_key)
        .map_err(|err| Error::validation(err.to_string()))?;

    Ok(PurchaseRequest {
        domain,
        years: body.years,
        whois_privacy: body.whois_privacy,
        allow_premium: body.allow_premium,
        allow_unicode: body.allow_unicode,
        nameserver_mode: body.nameserver_mode.into(),
        nameservers: body.nameservers.unwrap_or_default(),
        dns_template_id: body.dns_template_id,
        quoted_total_usd: body.quoted_total_usd,
        client_key,
    })
}

/// Register a domain.
///
/// # Errors
///
/// - `400`: validation, label safety, caps, premium or template problems.
/// - `401`: missing or unknown bearer credential.
/// - `409`: idempotency-key reuse with different parameters, or price drift.
/// - `429`: rate limit exhausted (`Retry-After` header set).
#[utoipa::path(
    post,
    path = "/buy",
    request_body = BuyRequest,
    responses(
        (status = 200, description = "Purchase committed or replayed"),
        (status = 400, description = "Request rejected before commitment"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Idempotency conflict or price drift"),
        (status = 429, description = "Rate limited")
    ),
    security(("bearer" = [])),
    tags = ["purchase"]
)]
#[post("/buy")]
pub async fn buy(
    state: web::Data<HttpState>,
    request: HttpRequest,
    body: web::Json<BuyRequest>,
) -> ApiResult<HttpResponse> {
    let user = require_identity(state.api_keys.as_ref(), &request).await?;

    if let Err(rejection) = state.rate_limiter.consume(&rate_limit_key(Some(&user), &request)) {
        return Err(rate_limited(rejection.seconds));
    }

    let purchase_request = validate(body.into_inner())?;
    let outcome = state.purchase.purchase(&user, purchase_request).await?;

    let body = match outcome {
        PurchaseOutcome::Completed(body) | PurchaseOutcome::Replayed(body) => body,
    };
    Ok(HttpResponse::Ok().json(body))
}
