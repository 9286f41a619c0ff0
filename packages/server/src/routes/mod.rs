use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn api_routes() -> OpenApiRouter<AppState> {
    let uploads = OpenApiRouter::new()
        .routes(routes!(handlers::blobs::upload_blob))
        .routes(routes!(handlers::disk::accept_disk_upload))
        .layer(handlers::blobs::upload_body_limit());

    OpenApiRouter::new()
        .routes(routes!(handlers::direct_uploads::create_direct_upload))
        .routes(routes!(handlers::blobs::redirect_blob))
        .routes(routes!(handlers::blobs::proxy_blob))
        .routes(routes!(handlers::representations::create_representation))
        .routes(routes!(handlers::representations::serve_representation))
        .routes(routes!(handlers::disk::serve_disk))
        .routes(routes!(handlers::attachments::create_attachment))
        .routes(routes!(handlers::attachments::list_attachments))
        .routes(routes!(handlers::attachments::delete_attachment))
        .merge(uploads)
}
