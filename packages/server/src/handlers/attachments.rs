use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;
use uuid::Uuid;

use blob_core::attachments::{self, OwnerRef};
use blob_core::blobs;

use crate::error::{AppError, ErrorBody};
use crate::models::attachment::{AttachRequest, AttachmentListResponse, AttachmentResponse};
use crate::models::blob::BlobResponse;
use crate::state::AppState;
use crate::utils::signed_ids;

#[utoipa::path(
    post,
    path = "/attachments",
    tag = "Attachments",
    operation_id = "createAttachment",
    summary = "Attach a blob to an owner",
    description = "Links a previously uploaded blob (by signed id) to an owning record under a \
        logical name. Re-attaching to an occupied slot atomically swaps the reference; the \
        displaced blob is purged in the background once orphaned.",
    request_body = AttachRequest,
    responses(
        (status = 201, description = "Attachment created", body = AttachmentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Unknown blob reference (NOT_FOUND, SIGNATURE_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, req), fields(owner_kind = %req.owner_kind, name = %req.name))]
pub async fn create_attachment(
    State(state): State<AppState>,
    Json(req): Json<AttachRequest>,
) -> Result<impl IntoResponse, AppError> {
    let blob_id = signed_ids::verify_blob_id(&state.ctx.signer, &req.blob_signed_id)?;
    let owner = OwnerRef::new(&state.ctx, &req.owner_kind, &req.owner_id)?;

    let attachment =
        attachments::attach(&state.ctx, &owner, &req.name, blob_id, req.position).await?;
    let blob = blobs::find(&state.ctx, attachment.blob_id).await?;
    let signed_id = signed_ids::sign_blob_id(&state.ctx.signer, blob.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AttachmentResponse::from_model(
            attachment,
            BlobResponse::from_model(blob, signed_id),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/attachments/{owner_kind}/{owner_id}",
    tag = "Attachments",
    operation_id = "listAttachments",
    summary = "List an owner's attachments",
    description = "Returns every attachment for the owner, ordered by name then position, each \
        with its blob record and a fresh signed id.",
    params(
        ("owner_kind" = String, Path, description = "Owner kind, e.g. `user`"),
        ("owner_id" = String, Path, description = "Owner ID in canonical string form"),
    ),
    responses(
        (status = 200, description = "Attachment list", body = AttachmentListResponse),
        (status = 400, description = "Unknown owner kind (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_attachments(
    State(state): State<AppState>,
    Path((owner_kind, owner_id)): Path<(String, String)>,
) -> Result<Json<AttachmentListResponse>, AppError> {
    let owner = OwnerRef::new(&state.ctx, &owner_kind, &owner_id)?;
    let models = attachments::list(&state.ctx, &owner).await?;

    let mut responses = Vec::with_capacity(models.len());
    for model in models {
        let blob = blobs::find(&state.ctx, model.blob_id).await?;
        let signed_id = signed_ids::sign_blob_id(&state.ctx.signer, blob.id)?;
        responses.push(AttachmentResponse::from_model(
            model,
            BlobResponse::from_model(blob, signed_id),
        ));
    }

    let total = responses.len() as u64;
    Ok(Json(AttachmentListResponse {
        attachments: responses,
        total,
    }))
}

#[utoipa::path(
    delete,
    path = "/attachments/{id}",
    tag = "Attachments",
    operation_id = "deleteAttachment",
    summary = "Delete an attachment",
    description = "Removes the attachment. The blob is purged in the background if nothing else \
        references it; deleting an already-missing attachment succeeds.",
    params(("id" = String, Path, description = "Attachment ID (UUID)")),
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let attachment_id =
        Uuid::parse_str(&id).map_err(|_| AppError::Validation("Invalid attachment ID".into()))?;

    attachments::purge_attachment(&state.ctx, attachment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
