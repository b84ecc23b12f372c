//! Authentication helpers used by HTTP handlers.
//!
//! Keep the HTTP modules focused on request/response mapping by
//! concentrating credential checks and rate-limit key derivation here.

use actix_web::HttpRequest;
use actix_web::http::header;

use crate::domain::Error;
use crate::domain::ports::{ApiKeyRepository, AuthenticatedUser};

use super::ApiResult;

/// Extract the bearer token from the `Authorization` header, if present.
fn bearer_token(request: &HttpRequest) -> ApiResult<Option<&str>> {
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| Error::unauthorized("authorization header is not valid ASCII"))?;
    let token = text
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::unauthorized("authorization header must use the Bearer scheme"))?;
    Ok(Some(token))
}

/// Resolve the caller when a credential is presented; `None` otherwise.
///
/// A presented-but-unknown credential is rejected rather than downgraded to
/// anonymous, so clients learn about revoked keys immediately.
pub async fn optional_identity(
    api_keys: &dyn ApiKeyRepository,
    request: &HttpRequest,
) -> ApiResult<Option<AuthenticatedUser>> {
    let Some(token) = bearer_token(request)? else {
        return Ok(None);
    };
    let user = api_keys
        .find_user_by_key(token)
        .await
        .map_err(crate::domain::Error::from)?
        .ok_or_else(|| Error::unauthorized("unknown API key"))?;
    Ok(Some(user))
}

/// Resolve the caller, rejecting unauthenticated requests.
pub async fn require_identity(
    api_keys: &dyn ApiKeyRepository,
    request: &HttpRequest,
) -> ApiResult<AuthenticatedUser> {
    optional_identity(api_keys, request)
        .await?
        .ok_or_else(|| Error::unauthorized("missing bearer credential").into())
}

/// Rate-limit key: the account id when authenticated, the peer address
/// otherwise.
pub fn rate_limit_key(user: Option<&AuthenticatedUser>, request: &HttpRequest) -> String {
    match user {
        Some(user) => user.account_key(),
        None => {
            let peer = request
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_owned());
            format!("anon:{peer}")
        }
    }
}
