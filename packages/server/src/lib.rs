pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pantry Storage API",
        version = "1.0.0",
        description = "Multi-backend blob storage with mirrored writes, \
            attachments, image variants, and signed delivery URLs"
    ),
    tags(
        (name = "Blobs", description = "Blob ingest and delivery"),
        (name = "Direct Uploads", description = "Client-side uploads via presigned URLs"),
        (name = "Representations", description = "On-demand image variants"),
        (name = "Disk", description = "Signed endpoints backing the disk service"),
        (name = "Attachments", description = "Linking blobs to owning records"),
    ),
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(routes::api_routes())
        .split_for_parts();

    router
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
}
