//! Search endpoint.
//!
//! ```text
//! POST /search  Screen candidates and check availability
//! ```
//!
//! Authentication is optional; anonymous callers are rate-limited by peer
//! address.

use actix_web::{HttpRequest, HttpResponse, post, web};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{Error, SearchRequest, SearchSeed};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{optional_identity, rate_limit_key};
use crate::inbound::http::error::rate_limited;
use crate::inbound::http::state::HttpState;

const MAX_PROMPT_LEN: usize = 500;
const MAX_CANDIDATES: usize = 20;
const MAX_TLDS: usize = 10;
const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

/// Search request body. Exactly one of `prompt` / `candidates` is required.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SearchBody {
    /// Free-text prompt turned into a label, ≤ 500 characters.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Explicit candidate names, 1..=20 entries.
    #[serde(default)]
    pub candidates: Option<Vec<String>>,
    /// TLDs to try, 1..=10 entries, letters only.
    #[serde(default)]
    pub tlds: Option<Vec<String>>,
    /// Drop results priced above this USD amount.
    #[serde(default)]
    pub price_ceiling: Option<Decimal>,
    /// Result cap, default 10, ≤ 50.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Include premium-priced names.
    #[serde(default)]
    pub include_premium: bool,
    /// Screen labels with Unicode rules instead of ASCII-only.
    #[serde(default)]
    pub include_unicode: bool,
}

fn validate(body: SearchBody) -> Result<SearchRequest, Error> {
    let seed = match (body.prompt, body.candidates) {
        (Some(prompt), None) => {
            if prompt.chars().count() > MAX_PROMPT_LEN {
                return Err(Error::validation(format!(
                    "prompt must be at most {MAX_PROMPT_LEN} characters"
                )));
            }
            SearchSeed::Prompt(prompt)
        }
        (None, Some(candidates)) => {
            if candidates.is_empty() || candidates.len() > MAX_CANDIDATES {
                return Err(Error::validation(format!(
                    "candidates must contain between 1 and {MAX_CANDIDATES} entries"
                )));
            }
            SearchSeed::Candidates(candidates)
        }
        _ => {
            return Err(Error::validation(
                "provide exactly one of prompt or candidates",
            ));
        }
    };

    if let Some(tlds) = &body.tlds {
        if tlds.is_empty() || tlds.len() > MAX_TLDS {
            return Err(Error::validation(format!(
                "tlds must contain between 1 and {MAX_TLDS} entries"
            )));
        }
        for tld in tlds {
            if tld.is_empty() || !tld.chars().all(|ch| ch.is_ascii_alphabetic()) {
                return Err(Error::validation(format!(
                    "TLD {tld:?} must contain letters only"
                )));
            }
        }
    }

    let limit = body.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(Error::validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    Ok(SearchRequest {
        seed,
        tlds: body.tlds,
        price_ceiling: body.price_ceiling,
        limit,
        include_premium: body.include_premium,
        include_unicode: body.include_unicode,
    })
}

/// Search domain availability.
///
/// # Errors
///
/// - `400`: malformed body, every candidate unsafe or disallowed.
/// - `401`: a credential was presented but is unknown.
/// - `429`: rate limit exhausted (`Retry-After` header set).
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchBody,
    responses(
        (status = 200, description = "Scored candidates", body = crate::domain::SearchResponse),
        (status = 400, description = "Request rejected"),
        (status = 429, description = "Rate limited")
    ),
    tags = ["search"]
)]
#[post("/search")]
pub async fn search(
    state: web::Data<HttpState>,
    request: HttpRequest,
    body: web::Json<SearchBody>,
) -> ApiResult<HttpResponse> {
    let user = optional_identity(state.api_keys.as_ref(), &request).await?;

    let key = rate_limit_key(user.as_ref(), &request);
    if let Err(rejection) = state.rate_limiter.consume(&key) {
        return Err(rate_limited(rejection.seconds));
    }

    let search_request = validate(body.into_inner())?;
    let response = state
        .search
        .search(user.map(|user| user.id), search_request)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}
