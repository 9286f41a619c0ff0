use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use blob_core::blobs;
use common::checksum::Checksum;

use crate::error::{AppError, ErrorBody};
use crate::models::blob::BlobResponse;
use crate::models::direct_upload::{DirectUploadRequest, DirectUploadResponse};
use crate::state::AppState;
use crate::utils::signed_ids;

#[utoipa::path(
    post,
    path = "/direct-uploads",
    tag = "Direct Uploads",
    operation_id = "createDirectUpload",
    summary = "Prepare a client-side upload",
    description = "Records the blob metadata and returns a presigned upload URL plus the headers \
        the client must send. The URL targets the primary backend; mirror replication is \
        deferred until the blob is attached. Blobs whose upload is abandoned are reclaimed by \
        the maintenance sweep.",
    request_body = DirectUploadRequest,
    responses(
        (status = 201, description = "Upload prepared", body = DirectUploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "Backend unavailable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, req), fields(filename = %req.filename, byte_size = req.byte_size))]
pub async fn create_direct_upload(
    State(state): State<AppState>,
    Json(req): Json<DirectUploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let checksum = Checksum::from_hex(&req.checksum)
        .map_err(|e| AppError::Validation(format!("Invalid checksum: {e}")))?;

    let (blob, upload) = blobs::create_for_direct_upload(
        &state.ctx,
        req.filename,
        req.content_type,
        req.byte_size,
        checksum,
    )
    .await?;

    let signed_id = signed_ids::sign_blob_id(&state.ctx.signer, blob.id)?;
    Ok((
        StatusCode::CREATED,
        Json(DirectUploadResponse {
            blob: BlobResponse::from_model(blob, signed_id),
            upload_url: upload.url,
            upload_headers: upload.headers,
        }),
    ))
}
