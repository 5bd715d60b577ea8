//! # OpenAPI Specification Assembly
//!
//! Documents the unary routes. The WebSocket sessions are described in the
//! crate docs; OpenAPI has no vocabulary for their packet streams.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the unary API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hailer Dispatch API",
        version = "0.1.0",
        description = "Trip dispatch and state sync: passenger feedback and state reads. Trip sessions run over WebSocket at /v1/sessions/user and /v1/sessions/driver; driver positions stream to /v1/locations.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        crate::routes::feedback::provide_feedback,
        crate::routes::state::get_state,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::feedback::FeedbackRequest,
        crate::routes::feedback::FeedbackResponse,
    )),
    tags(
        (name = "feedback", description = "Passenger ratings"),
        (name = "state", description = "One-shot trip state"),
    )
)]
pub struct ApiDoc;

/// Serves the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_unary_routes() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(doc["paths"]["/v1/feedback"]["post"].is_object());
        assert!(doc["paths"]["/v1/state"]["get"].is_object());
        assert!(doc["components"]["schemas"]["FeedbackRequest"].is_object());
    }
}
