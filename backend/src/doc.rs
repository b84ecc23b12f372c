//! OpenAPI document aggregation (debug builds only).

use utoipa::OpenApi;

/// Aggregated API documentation served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::inbound::http::health::health,
        crate::inbound::http::search::search,
        crate::inbound::http::buy::buy,
        crate::inbound::http::status::status,
    ),
    components(schemas(
        crate::inbound::http::buy::BuyRequest,
        crate::inbound::http::buy::NameserverModeDto,
        crate::inbound::http::search::SearchBody,
        crate::domain::SearchResponse,
        crate::domain::search::SearchResult,
        crate::domain::DomainProjection,
        crate::domain::status::ProjectionState,
    )),
    tags(
        (name = "purchase", description = "Transactional domain registration"),
        (name = "search", description = "Candidate screening and availability"),
        (name = "status", description = "Persisted domain projections")
    )
)]
pub struct ApiDoc;
