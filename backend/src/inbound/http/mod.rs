//! HTTP adapters: handlers, DTO validation, auth, error envelope.

pub mod auth;
pub mod buy;
pub mod error;
pub mod health;
pub mod search;
pub mod state;
pub mod status;

pub use error::{ApiError, ApiResult};

use actix_web::HttpResponse;

use crate::domain::Error;

/// Fallback for unmatched routes: the same JSON envelope as every other
/// error.
pub async fn not_found() -> ApiResult<HttpResponse> {
    Err(Error::not_found("no such route").into())
}
