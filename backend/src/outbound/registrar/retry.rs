//! Retry classification and backoff for registrar HTTP calls.
//!
//! Transient upstream failures (HTTP 429, 5xx, transport errors) are
//! retried up to [`MAX_ATTEMPTS`] with exponential backoff; every other
//! HTTP status is terminal and surfaces immediately.

use std::time::Duration;

use reqwest::StatusCode;

/// Total attempts per call, including the first.
pub(crate) const MAX_ATTEMPTS: u32 = 3;

/// Whether a response status is worth retrying.
pub(crate) fn status_is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before the next attempt, `2^attempts_completed` seconds.
pub(crate) fn backoff_delay(attempts_completed: u32) -> Duration {
    Duration::from_secs(2_u64.pow(attempts_completed))
}

/// Sleep out the backoff window after a failed attempt.
pub(crate) async fn wait_before_retry(attempts_completed: u32) {
    tokio::time::sleep(backoff_delay(attempts_completed)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::too_many_requests(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, true)]
    #[case::internal(StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, false)]
    #[case::not_found(StatusCode::NOT_FOUND, false)]
    #[case::payment_required(StatusCode::PAYMENT_REQUIRED, false)]
    fn only_throttle_and_server_errors_retry(#[case] status: StatusCode, #[case] expected: bool) {
        assert_eq!(status_is_retryable(status), expected);
    }

    #[rstest]
    #[case(1, 2)]
    #[case(2, 4)]
    fn backoff_doubles_per_attempt(#[case] completed: u32, #[case] secs: u64) {
        assert_eq!(backoff_delay(completed), Duration::from_secs(secs));
    }
}
