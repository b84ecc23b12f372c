//! Tracing middleware attaching a request-scoped trace identifier.
//!
//! Each incoming request receives a UUID `trace_id` stored in task-local
//! context for correlation across logs and error responses, and echoed back
//! in a `Trace-Id` response header.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tokio::task_local;
use tracing::info_span;
use uuid::Uuid;

/// Response header carrying the request's trace identifier.
pub const TRACE_ID_HEADER: &str = "Trace-Id";

/// Request-scoped trace identifier, also available via extensions.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

task_local! {
    static TRACE_ID: String;
}

/// Retrieve the trace identifier for the current task if set.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// Tracing middleware attaching a request-scoped UUID and adding a
/// `Trace-Id` header to every response.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use backend::Trace;
///
/// let app = App::new().wrap(Trace);
/// ```
#[derive(Clone)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { service }))
    }
}

/// Service wrapper produced by [`Trace`]. Not used directly.
pub struct TraceMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let trace_id = Uuid::new_v4().to_string();
        req.extensions_mut().insert(TraceId(trace_id.clone()));
        let span =
            info_span!("request", trace_id = %trace_id, method = %req.method(), path = %req.path());
        let fut = self.service.call(req);

        Box::pin(TRACE_ID.scope(trace_id.clone(), async move {
            let _enter = span.enter();
            let mut response = fut.await?;
            if let Ok(value) = HeaderValue::from_str(&trace_id) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("trace-id"), value);
            }
            Ok(response)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test as actix_test, web};

    #[actix_web::test]
    async fn responses_carry_a_trace_id_header() {
        let app = actix_test::init_service(
            App::new()
                .wrap(Trace)
                .route("/ping", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri("/ping").to_request())
                .await;
        assert_eq!(response.status(), StatusCode::OK);
        let header = response
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace header present");
        assert_eq!(header.to_str().expect("ascii header").len(), 36);
    }

    #[test]
    fn trace_id_is_absent_outside_a_request_scope() {
        assert!(current_trace_id().is_none());
    }
}
