use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use blob_core::entity::attachment;

use crate::models::blob::BlobResponse;

/// Request DTO for attaching a blob to an owner.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AttachRequest {
    #[schema(example = "user")]
    pub owner_kind: String,
    #[schema(example = "42")]
    pub owner_id: String,
    /// Logical attribute name, e.g. "avatar" or "gallery".
    #[schema(example = "avatar")]
    pub name: String,
    /// Signed blob reference from upload or direct-upload.
    pub blob_signed_id: String,
    /// Slot for multi-valued attachments; omit for single-valued.
    pub position: Option<i32>,
}

/// Response DTO for a single attachment.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AttachmentResponse {
    /// Attachment ID (UUIDv7).
    pub id: String,
    #[schema(example = "avatar")]
    pub name: String,
    #[schema(example = "user")]
    pub owner_kind: String,
    #[schema(example = "42")]
    pub owner_id: String,
    pub position: i32,
    pub blob: BlobResponse,
    pub created_at: DateTime<Utc>,
}

impl AttachmentResponse {
    pub fn from_model(model: attachment::Model, blob: BlobResponse) -> Self {
        Self {
            id: model.id.to_string(),
            name: model.name,
            owner_kind: model.owner_kind,
            owner_id: model.owner_id,
            position: model.position,
            blob,
            created_at: model.created_at,
        }
    }
}

/// Response DTO for listing an owner's attachments.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AttachmentListResponse {
    pub attachments: Vec<AttachmentResponse>,
    pub total: u64,
}
