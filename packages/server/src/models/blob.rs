use chrono::{DateTime, Utc};
use serde::Serialize;

use blob_core::entity::blob;

/// Response DTO for a blob record.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BlobResponse {
    /// Blob ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    /// Tamper-evident reference accepted by delivery and attachment
    /// endpoints.
    pub signed_id: String,
    /// Backend storage key.
    #[schema(example = "b1hkx0q7w3m9p2z5c8v4n6j0r7t2")]
    pub key: String,
    /// Original upload filename.
    #[schema(example = "avatar.png")]
    pub filename: String,
    /// MIME content type.
    #[schema(example = "image/png")]
    pub content_type: String,
    /// Blob size in bytes.
    #[schema(example = 142857)]
    pub byte_size: i64,
    /// SHA-256 checksum (hex).
    pub checksum: String,
    /// Storage service the bytes live on.
    #[schema(example = "local")]
    pub service_name: String,
    pub created_at: DateTime<Utc>,
}

impl BlobResponse {
    pub fn from_model(model: blob::Model, signed_id: String) -> Self {
        Self {
            id: model.id.to_string(),
            signed_id,
            key: model.key,
            filename: model.filename,
            content_type: model.content_type,
            byte_size: model.byte_size,
            checksum: model.checksum,
            service_name: model.service_name,
            created_at: model.created_at,
        }
    }
}
