use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::blob::BlobResponse;

/// Request DTO for preparing a client-side upload.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct DirectUploadRequest {
    #[schema(example = "video.mp4")]
    pub filename: String,
    #[schema(example = "video/mp4")]
    pub content_type: String,
    /// Declared size in bytes; the upload URL is bound to it.
    #[schema(example = 9048576)]
    pub byte_size: u64,
    /// SHA-256 checksum of the bytes the client will upload (hex).
    pub checksum: String,
}

/// Response DTO carrying the blob record and where to send the bytes.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DirectUploadResponse {
    pub blob: BlobResponse,
    /// Presigned upload URL. Expires with the configured URL window.
    pub upload_url: String,
    /// Headers the client must send with the upload request.
    pub upload_headers: HashMap<String, String>,
}
