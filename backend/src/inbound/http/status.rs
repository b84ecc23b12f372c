//! Status endpoint.
//!
//! ```text
//! GET /status/{domain}  Project this gateway's view of a domain
//! ```

use actix_web::{HttpRequest, HttpResponse, get, web};

use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{optional_identity, rate_limit_key};
use crate::inbound::http::error::rate_limited;
use crate::inbound::http::state::HttpState;

/// Look up the persisted state of a domain.
///
/// Untracked domains answer `unknown` with a 200 so the endpoint can be
/// polled safely.
///
/// # Errors
///
/// - `400`: malformed or disallowed domain name.
/// - `429`: rate limit exhausted (`Retry-After` header set).
#[utoipa::path(
    get,
    path = "/status/{domain}",
    params(("domain" = String, Path, description = "Domain name, label.tld")),
    responses(
        (status = 200, description = "Domain projection", body = crate::domain::DomainProjection),
        (status = 400, description = "Malformed or disallowed domain"),
        (status = 429, description = "Rate limited")
    ),
    tags = ["status"]
)]
#[get("/status/{domain}")]
pub async fn status(
    state: web::Data<HttpState>,
    request: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = optional_identity(state.api_keys.as_ref(), &request).await?;

    let key = rate_limit_key(user.as_ref(), &request);
    if let Err(rejection) = state.rate_limiter.consume(&key) {
        return Err(rate_limited(rejection.seconds));
    }

    let projection = state.status.lookup(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(projection))
}
