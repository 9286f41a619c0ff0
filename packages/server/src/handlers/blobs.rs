use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use blob_core::blobs::{self, NewBlob};
use common::service::Disposition;

use crate::error::{AppError, ErrorBody};
use crate::models::blob::BlobResponse;
use crate::state::AppState;
use crate::utils::signed_ids;

pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(128 * 1024 * 1024) // 128 MB
}

/// Query parameters shared by the delivery endpoints.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeliveryQuery {
    /// `inline` (default) or `attachment`.
    pub disposition: Option<String>,
}

impl DeliveryQuery {
    pub fn disposition(&self) -> Disposition {
        match self.disposition.as_deref() {
            Some("attachment") => Disposition::Attachment,
            _ => Disposition::Inline,
        }
    }
}

#[utoipa::path(
    post,
    path = "/blobs",
    tag = "Blobs",
    operation_id = "uploadBlob",
    summary = "Upload a blob",
    description = "Stores the `file` multipart field and records the blob. The content type is \
        sniffed from the bytes unless the `identify` field is `false`, in which case the \
        declared field content type is trusted.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "Blob created", body = BlobResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "Backend unavailable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_blob(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut declared_type: Option<String> = None;
    let mut identify = true;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(|s| s.to_string());
                declared_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            Some("identify") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read field: {e}")))?;
                identify = text.trim() != "false";
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let bytes = file_bytes.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    let filename =
        file_name.ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;

    let blob = blobs::create_blob(
        &state.ctx,
        NewBlob {
            bytes: &bytes,
            filename,
            content_type: declared_type,
            identify,
        },
    )
    .await?;

    let signed_id = signed_ids::sign_blob_id(&state.ctx.signer, blob.id)?;
    Ok((
        StatusCode::CREATED,
        Json(BlobResponse::from_model(blob, signed_id)),
    ))
}

#[utoipa::path(
    get,
    path = "/blobs/redirect/{signed_id}/{filename}",
    tag = "Blobs",
    operation_id = "redirectBlob",
    summary = "Redirect to a signed backend URL",
    description = "Responds 302 with a short-lived signed URL on the blob's storage backend. \
        The filename segment is cosmetic; the signed id alone selects the blob.",
    params(
        ("signed_id" = String, Path, description = "Signed blob reference"),
        ("filename" = String, Path, description = "Filename for the final URL"),
        DeliveryQuery,
    ),
    responses(
        (status = 302, description = "Redirect to the backend URL"),
        (status = 404, description = "Unknown or invalid reference (NOT_FOUND, SIGNATURE_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(signed_id))]
pub async fn redirect_blob(
    State(state): State<AppState>,
    Path((signed_id, _filename)): Path<(String, String)>,
    Query(query): Query<DeliveryQuery>,
) -> Result<Response, AppError> {
    let blob_id = signed_ids::verify_blob_id(&state.ctx.signer, &signed_id)?;
    let blob = blobs::find(&state.ctx, blob_id).await?;
    let url = blobs::url_for_blob(&state.ctx, &blob, query.disposition()).await?;

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, url)
        .body(Body::empty())
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    get,
    path = "/blobs/proxy/{signed_id}/{filename}",
    tag = "Blobs",
    operation_id = "proxyBlob",
    summary = "Stream a blob through the app",
    description = "Streams the blob body with long-lived immutable caching headers so a CDN in \
        front of the app can absorb repeat traffic. Supports ETag revalidation via \
        If-None-Match.",
    params(
        ("signed_id" = String, Path, description = "Signed blob reference"),
        ("filename" = String, Path, description = "Filename for the final URL"),
        DeliveryQuery,
    ),
    responses(
        (status = 200, description = "Blob content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "Unknown or invalid reference (NOT_FOUND, SIGNATURE_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query, headers), fields(signed_id))]
pub async fn proxy_blob(
    State(state): State<AppState>,
    Path((signed_id, _filename)): Path<(String, String)>,
    Query(query): Query<DeliveryQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let blob_id = signed_ids::verify_blob_id(&state.ctx.signer, &signed_id)?;
    let blob = blobs::find(&state.ctx, blob_id).await?;

    let etag_value = format!("\"{}\"", blob.checksum);
    if if_none_match_hits(&headers, &etag_value) {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let service = blobs::service_for(&state.ctx, &blob)?;
    let reader = service.stream(&blob.key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &blob.content_type)
        .header(header::CONTENT_LENGTH, blob.byte_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            query.disposition().header_value(&blob.filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// Whether the request's `If-None-Match` matches the current ETag.
pub fn if_none_match_hits(headers: &HeaderMap, etag_value: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|val| val == etag_value || val == "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_defaults_to_inline() {
        let query = DeliveryQuery { disposition: None };
        assert_eq!(query.disposition(), Disposition::Inline);

        let query = DeliveryQuery {
            disposition: Some("attachment".into()),
        };
        assert_eq!(query.disposition(), Disposition::Attachment);

        // Unknown values fall back to inline rather than erroring.
        let query = DeliveryQuery {
            disposition: Some("banana".into()),
        };
        assert_eq!(query.disposition(), Disposition::Inline);
    }

    #[test]
    fn if_none_match_compares_etags() {
        let mut headers = HeaderMap::new();
        assert!(!if_none_match_hits(&headers, "\"abc\""));

        headers.insert(header::IF_NONE_MATCH, "\"abc\"".parse().unwrap());
        assert!(if_none_match_hits(&headers, "\"abc\""));
        assert!(!if_none_match_hits(&headers, "\"def\""));

        headers.insert(header::IF_NONE_MATCH, "*".parse().unwrap());
        assert!(if_none_match_hits(&headers, "\"anything\""));
    }
}
