//! OpenAPI documentation for the HTTP surface.
//!
//! The board itself is served over the `/ws` session; the document covers
//! the probes and the error payload every HTTP failure renders.

use actix_web::{HttpResponse, get};
use utoipa::OpenApi;

use crate::domain::{Error, ErrorCode};

/// OpenAPI document for the HTTP endpoints.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Task board backend",
        description = "Health probes for the group task board service."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(Error, ErrorCode)),
    tags(
        (name = "health", description = "Orchestration probes")
    )
)]
pub struct ApiDoc;

/// Serve the generated document as JSON.
#[get("/openapi.json")]
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};

    #[::core::prelude::v1::test]
    fn documents_both_probes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health/ready"));
        assert!(doc.paths.paths.contains_key("/health/live"));
    }

    #[::core::prelude::v1::test]
    fn registers_the_error_schema() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("Error"));
        assert!(schemas.contains_key("ErrorCode"));
    }

    #[actix_web::test]
    async fn serves_the_document() {
        let app = test::init_service(App::new().service(openapi_json)).await;
        let req = test::TestRequest::get().uri("/openapi.json").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["info"]["title"], "Task board backend");
    }
}
