//! HTTP error payloads and mapping from domain errors.
//!
//! Keep the domain free of transport concerns by translating
//! [`crate::domain::Error`] into Actix responses here. The wire envelope is
//! `{error, message, details?, status}`; rate-limit rejections additionally
//! carry a `Retry-After` header.

use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use tracing::error;

use crate::domain::{Error as DomainError, ErrorKind};
use crate::middleware::trace::{TRACE_ID_HEADER, current_trace_id};

/// Wire-facing error wrapper implementing [`ResponseError`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError(DomainError);

impl ApiError {
    /// The wrapped domain error.
    pub fn inner(&self) -> &DomainError {
        &self.0
    }

    fn to_status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::ValidationError
            | ErrorKind::UnsafeLabel
            | ErrorKind::NonAsciiNotAllowed
            | ErrorKind::UnicodeMustUsePunycode
            | ErrorKind::PremiumNotAllowed
            | ErrorKind::SpendCapExceeded
            | ErrorKind::DailyCapExceeded
            | ErrorKind::UnknownDnsTemplate
            | ErrorKind::NameserversRequired => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::IdempotencyMismatch | ErrorKind::PriceDrift => StatusCode::CONFLICT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Seconds advertised in `Retry-After`, when the error carries them.
    fn retry_after_secs(&self) -> Option<u64> {
        self.0
            .details()
            .and_then(|details| details.get("retryAfterSec"))
            .and_then(serde_json::Value::as_u64)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        let value = match current_trace_id() {
            Some(trace_id) if value.trace_id().is_none() => value.with_trace_id(trace_id),
            _ => value,
        };
        ApiError(value)
    }
}

impl From<actix_web::Error> for ApiError {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "actix error promoted to API error");
        ApiError::from(DomainError::internal(err.to_string()))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.message())
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.to_status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let safe = self.0.redacted_for_clients();

        let mut body = json!({
            "error": safe.kind(),
            "message": safe.message(),
            "status": status.as_u16(),
        });
        if let Some(details) = safe.details() {
            body["details"] = details.clone();
        }

        let mut builder = HttpResponse::build(status);
        if let Some(trace_id) = safe.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, trace_id));
        }
        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                builder.insert_header((HeaderName::from_static("retry-after"), value));
            }
        }
        builder.json(body)
    }
}

/// Convenience alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Build the rejection for an exhausted rate limit.
pub fn rate_limited(retry_after_secs: u64) -> ApiError {
    ApiError::from(
        DomainError::new(ErrorKind::RateLimited, "rate limit exceeded; slow down")
            .with_details(json!({ "retryAfterSec": retry_after_secs })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::validation(ErrorKind::ValidationError, StatusCode::BAD_REQUEST)]
    #[case::unsafe_label(ErrorKind::UnsafeLabel, StatusCode::BAD_REQUEST)]
    #[case::premium(ErrorKind::PremiumNotAllowed, StatusCode::BAD_REQUEST)]
    #[case::daily_cap(ErrorKind::DailyCapExceeded, StatusCode::BAD_REQUEST)]
    #[case::unauthorized(ErrorKind::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case::not_found(ErrorKind::NotFound, StatusCode::NOT_FOUND)]
    #[case::idempotency(ErrorKind::IdempotencyMismatch, StatusCode::CONFLICT)]
    #[case::drift(ErrorKind::PriceDrift, StatusCode::CONFLICT)]
    #[case::rate_limited(ErrorKind::RateLimited, StatusCode::TOO_MANY_REQUESTS)]
    #[case::internal(ErrorKind::InternalError, StatusCode::INTERNAL_SERVER_ERROR)]
    fn kinds_map_to_their_status_codes(#[case] kind: ErrorKind, #[case] expected: StatusCode) {
        let api_error = ApiError::from(DomainError::new(kind, "boom"));
        assert_eq!(api_error.status_code(), expected);
    }

    #[test]
    fn envelope_carries_kind_message_and_status() {
        let api_error = ApiError::from(
            DomainError::new(ErrorKind::PriceDrift, "quote drifted")
                .with_details(json!({ "drift": "1.00" })),
        );
        let response = api_error.error_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn rate_limit_rejections_advertise_retry_after() {
        let api_error = rate_limited(17);
        let response = api_error.error_response();
        let header = response
            .headers()
            .get("retry-after")
            .expect("Retry-After present");
        assert_eq!(header.to_str().expect("ascii"), "17");
    }

    #[test]
    fn internal_detail_is_redacted() {
        let api_error = ApiError::from(DomainError::internal("dsn=postgres://secret"));
        let response = api_error.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The redacted body is generic; the original message stays server-side.
    }
}
