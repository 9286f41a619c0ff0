use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use common::service::disk::{DiskReadClaims, DiskUploadClaims};
use common::signed::TokenPurpose;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/disk/{token}/{filename}",
    tag = "Disk",
    operation_id = "serveDiskObject",
    summary = "Serve an object from a disk service",
    description = "Target of signed read URLs minted by disk-backed services. The token encodes \
        the service, key, content type, and disposition; it expires with the URL window.",
    params(
        ("token" = String, Path, description = "Signed read token"),
        ("filename" = String, Path, description = "Filename for the Content-Disposition header"),
    ),
    responses(
        (status = 200, description = "Object content"),
        (status = 404, description = "Expired token or missing object (SIGNATURE_INVALID, NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, token))]
pub async fn serve_disk(
    State(state): State<AppState>,
    Path((token, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let claims: DiskReadClaims = state.ctx.signer.verify(TokenPurpose::DiskRead, &token)?;

    let service = state
        .ctx
        .services
        .get(&claims.service)
        .ok_or_else(|| AppError::Internal(format!("unknown service '{}'", claims.service)))?;

    let reader = service.stream(&claims.key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &claims.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            claims.disposition.header_value(&filename),
        )
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    put,
    path = "/disk/{token}",
    tag = "Disk",
    operation_id = "acceptDiskUpload",
    summary = "Accept a direct upload for a disk service",
    description = "Target of signed direct-upload URLs minted by disk-backed services. The body \
        must match the declared length and checksum the token was minted for; a mismatch \
        rejects the upload and leaves no partial object.",
    params(("token" = String, Path, description = "Signed upload token")),
    request_body(content_type = "application/octet-stream", description = "Raw upload body"),
    responses(
        (status = 204, description = "Object stored"),
        (status = 400, description = "Length mismatch (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Expired or invalid token (SIGNATURE_INVALID)", body = ErrorBody),
        (status = 422, description = "Checksum mismatch (CHECKSUM_MISMATCH)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, token, headers, body))]
pub async fn accept_disk_upload(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let claims: DiskUploadClaims = state.ctx.signer.verify(TokenPurpose::DiskUpload, &token)?;

    if body.len() as u64 != claims.content_length {
        return Err(AppError::Validation(format!(
            "Body length {} does not match declared length {}",
            body.len(),
            claims.content_length
        )));
    }
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        if content_type.to_str().ok() != Some(claims.content_type.as_str()) {
            return Err(AppError::Validation(
                "Content-Type does not match the declared type".into(),
            ));
        }
    }

    let service = state
        .ctx
        .services
        .get(&claims.service)
        .ok_or_else(|| AppError::Internal(format!("unknown service '{}'", claims.service)))?;

    // Checksum verification happens inside put; a mismatch maps to 422.
    service
        .put(&claims.key, &body, &claims.checksum, &claims.content_type)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
