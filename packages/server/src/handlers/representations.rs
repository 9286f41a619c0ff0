use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use blob_core::{Transformation, blobs, representable};
use common::jobs::StorageJob;
use common::service::{Disposition, encode_path_segment};

use crate::error::{AppError, ErrorBody};
use crate::handlers::blobs::if_none_match_hits;
use crate::models::representation::{RepresentationRequest, RepresentationResponse};
use crate::state::AppState;
use crate::utils::signed_ids;

#[utoipa::path(
    post,
    path = "/representations",
    tag = "Representations",
    operation_id = "createRepresentation",
    summary = "Mint representation URLs",
    description = "Signs the transformation into a variation token and returns the delivery URLs \
        carrying it. With `preprocess` the variant is derived by a background job so the first \
        delivery request serves a stored artifact; when background jobs are disabled it is \
        derived before responding.",
    request_body = RepresentationRequest,
    responses(
        (status = 201, description = "URLs minted", body = RepresentationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Unknown reference or unrepresentable blob (NOT_FOUND, SIGNATURE_INVALID, UNREPRESENTABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, req))]
pub async fn create_representation(
    State(state): State<AppState>,
    Json(req): Json<RepresentationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let blob_id = signed_ids::verify_blob_id(&state.ctx.signer, &req.blob_signed_id)?;
    let blob = blobs::find(&state.ctx, blob_id).await?;

    if !representable(&blob.content_type) {
        return Err(AppError::Unrepresentable(format!(
            "{} has no image representation",
            blob.content_type
        )));
    }

    let transformation = req.transformation.normalized();
    let variation = signed_ids::sign_variation(&state.ctx.signer, &transformation)?;

    if req.preprocess {
        let job = preprocess_job(blob.id, &transformation)?;
        if !state.ctx.enqueue(&job).await? {
            state
                .variants
                .variant_for(&state.ctx, &blob, &transformation)
                .await?;
        }
    }

    let base = state.config.server.public_base.trim_end_matches('/');
    Ok((
        StatusCode::CREATED,
        Json(RepresentationResponse {
            redirect_url: representation_url(
                base,
                "redirect",
                &req.blob_signed_id,
                &variation,
                &blob.filename,
            ),
            proxy_url: representation_url(
                base,
                "proxy",
                &req.blob_signed_id,
                &variation,
                &blob.filename,
            ),
            variation,
        }),
    ))
}

fn representation_url(
    base: &str,
    mode: &str,
    signed_id: &str,
    variation: &str,
    filename: &str,
) -> String {
    format!(
        "{base}/representations/{mode}/{signed_id}/{variation}/{}",
        encode_path_segment(filename)
    )
}

/// Build the background job that pre-derives a variant.
///
/// The payload carries the serialized transformation so the worker can
/// rebuild it without a shared in-process type registry.
fn preprocess_job(blob_id: Uuid, transformation: &Transformation) -> Result<StorageJob, AppError> {
    let transformation = serde_json::to_value(transformation)
        .map_err(|e| AppError::Internal(format!("transformation serialization: {e}")))?;
    Ok(StorageJob::TransformVariant {
        blob_id,
        transformation,
    })
}

#[utoipa::path(
    get,
    path = "/representations/{mode}/{signed_id}/{variation}/{filename}",
    tag = "Representations",
    operation_id = "serveRepresentation",
    summary = "Serve an image variant",
    description = "Generates (or reuses) the variant described by the signed variation token and \
        serves it. `mode` is `redirect` for a 302 to a signed backend URL or `proxy` for a \
        streamed body. Non-image blobs respond 404 with code UNREPRESENTABLE so callers can \
        fall back to plain download links; concurrent generation pressure responds 503 with \
        Retry-After.",
    params(
        ("mode" = String, Path, description = "`redirect` or `proxy`"),
        ("signed_id" = String, Path, description = "Signed blob reference"),
        ("variation" = String, Path, description = "Signed variation token"),
        ("filename" = String, Path, description = "Filename for the final URL"),
    ),
    responses(
        (status = 200, description = "Variant content (proxy mode)"),
        (status = 302, description = "Redirect to the backend URL (redirect mode)"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "Unknown reference or unrepresentable blob (NOT_FOUND, SIGNATURE_INVALID, UNREPRESENTABLE)", body = ErrorBody),
        (status = 503, description = "Variant generation contended (CONTENDED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers), fields(mode, signed_id))]
pub async fn serve_representation(
    State(state): State<AppState>,
    Path((mode, signed_id, variation, filename)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let proxy = match mode.as_str() {
        "redirect" => false,
        "proxy" => true,
        other => {
            return Err(AppError::Validation(format!(
                "Unknown delivery mode '{other}'"
            )));
        }
    };

    let blob_id = signed_ids::verify_blob_id(&state.ctx.signer, &signed_id)?;
    let transformation = signed_ids::verify_variation(&state.ctx.signer, &variation)?;
    let blob = blobs::find(&state.ctx, blob_id).await?;

    // Checked before touching the engine so documents and videos short-circuit
    // without acquiring any lock.
    if !representable(&blob.content_type) {
        return Err(AppError::Unrepresentable(format!(
            "{} has no image representation",
            blob.content_type
        )));
    }

    let record = state
        .variants
        .variant_for(&state.ctx, &blob, &transformation)
        .await?;
    let service = blobs::service_for(&state.ctx, &blob)?;

    if !proxy {
        let url = service
            .url_for_read(
                &record.key,
                Duration::from_secs(state.ctx.url_expiry_secs),
                &filename,
                &record.content_type,
                Disposition::Inline,
            )
            .await?;
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, url)
            .body(Body::empty())
            .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")));
    }

    let etag_value = format!("\"{}\"", record.variation_digest);
    if if_none_match_hits(&headers, &etag_value) {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let reader = service.stream(&record.key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &record.content_type)
        .header(header::CONTENT_LENGTH, record.byte_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            Disposition::Inline.header_value(&filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representation_urls_embed_tokens_and_encode_filenames() {
        let url = representation_url(
            "http://localhost:3000",
            "proxy",
            "signed-blob",
            "signed-variation",
            "summer photo.jpg",
        );
        assert_eq!(
            url,
            "http://localhost:3000/representations/proxy/signed-blob/signed-variation/summer%20photo.jpg"
        );
    }

    #[test]
    fn preprocess_job_payload_round_trips() {
        let blob_id = Uuid::now_v7();
        let transformation = Transformation {
            resize_to_limit: Some((640, 480)),
            quality: Some(85),
            ..Default::default()
        };

        let job = preprocess_job(blob_id, &transformation).unwrap();
        let StorageJob::TransformVariant {
            blob_id: job_blob_id,
            transformation: payload,
        } = job
        else {
            panic!("expected a transform job");
        };

        assert_eq!(job_blob_id, blob_id);
        // The worker rebuilds the transformation from the payload; the two
        // sides must agree on the wire shape.
        let rebuilt: Transformation = serde_json::from_value(payload).unwrap();
        assert_eq!(rebuilt, transformation);
    }
}
