use serde::{Deserialize, Serialize};

use blob_core::Transformation;

/// Request body for minting representation URLs.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RepresentationRequest {
    /// Signed blob reference.
    pub blob_signed_id: String,
    /// Transformation parameters: `resize_to_limit` ([width, height]),
    /// `format` (png/jpeg/gif/webp), `quality` (1-100, JPEG only).
    #[schema(value_type = Object)]
    pub transformation: Transformation,
    /// Derive the variant in the background now instead of on the first
    /// delivery request.
    #[serde(default)]
    pub preprocess: bool,
}

/// Signed URLs for one variant of one blob.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RepresentationResponse {
    /// Signed variation token embedded in the URLs below.
    pub variation: String,
    /// Delivery URL responding 302 to a short-lived backend URL.
    pub redirect_url: String,
    /// Delivery URL streaming the variant through the application.
    pub proxy_url: String,
}
