mod engine;
mod single_flight;
mod transformer;

pub use engine::VariantEngine;
pub use single_flight::KeyedLocks;
pub use transformer::{TransformOutput, transform};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raster formats variants can be encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl VariantFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Gif => image::ImageFormat::Gif,
            Self::Webp => image::ImageFormat::WebP,
        }
    }

    /// The format matching a web-safe source content type, if any.
    pub fn from_web_safe(content_type: &str) -> Option<Self> {
        match content_type {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

/// Normalized transformation parameters.
///
/// The canonical serialized form (fixed field order, absent fields omitted)
/// feeds the digest, so two requests for the same transformation always map
/// to the same stored variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transformation {
    /// Shrink to fit within (width, height), preserving aspect ratio.
    /// Never upscales.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_to_limit: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<VariantFormat>,
    /// JPEG quality, clamped to 1..=100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl Transformation {
    /// Clamp out-of-range parameters instead of erroring.
    pub fn normalized(&self) -> Self {
        Self {
            resize_to_limit: self
                .resize_to_limit
                .map(|(w, h)| (w.max(1), h.max(1))),
            format: self.format,
            quality: self.quality.map(|q| q.clamp(1, 100)),
        }
    }

    /// Deterministic digest of the normalized parameters.
    ///
    /// The canonical form is built field by field in a fixed order with
    /// absent fields omitted, so serialization quirks can never split one
    /// transformation across two digests.
    pub fn digest(&self) -> String {
        let n = self.normalized();
        let mut canonical = String::new();
        if let Some((w, h)) = n.resize_to_limit {
            canonical.push_str(&format!("resize_to_limit={w}x{h};"));
        }
        if let Some(format) = n.format {
            canonical.push_str(&format!("format={};", format.mime_type()));
        }
        if let Some(quality) = n.quality {
            canonical.push_str(&format!("quality={quality};"));
        }
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Output format policy: the requested format wins; otherwise the
    /// source format when it is web-safe, otherwise PNG. Serving obscure
    /// raster formats to browsers is never the default.
    pub fn output_format(&self, source_content_type: &str) -> VariantFormat {
        self.format
            .or_else(|| VariantFormat::from_web_safe(source_content_type))
            .unwrap_or(VariantFormat::Png)
    }
}

/// Whether a content type can be turned into an image variant.
///
/// Deliberately infallible: unsupported types return false, they never
/// error, so a listing page mixing images and documents cannot crash on
/// the documents.
pub fn representable(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/png" | "image/jpeg" | "image/gif" | "image/webp" | "image/tiff" | "image/bmp"
    )
}

/// Backend key for a variant artifact.
pub fn variant_key(blob_key: &str, digest: &str) -> String {
    format!("variants/{blob_key}/{digest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let t = Transformation {
            resize_to_limit: Some((100, 100)),
            format: None,
            quality: None,
        };
        assert_eq!(t.digest(), t.digest());
    }

    #[test]
    fn digest_distinguishes_transformations() {
        let a = Transformation {
            resize_to_limit: Some((100, 100)),
            ..Default::default()
        };
        let b = Transformation {
            resize_to_limit: Some((50, 50)),
            ..Default::default()
        };
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn digest_ignores_clamped_differences() {
        let a = Transformation {
            quality: Some(200),
            ..Default::default()
        };
        let b = Transformation {
            quality: Some(100),
            ..Default::default()
        };
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn output_format_prefers_request() {
        let t = Transformation {
            format: Some(VariantFormat::Webp),
            ..Default::default()
        };
        assert_eq!(t.output_format("image/jpeg"), VariantFormat::Webp);
    }

    #[test]
    fn web_safe_source_keeps_its_format() {
        let t = Transformation::default();
        assert_eq!(t.output_format("image/jpeg"), VariantFormat::Jpeg);
        assert_eq!(t.output_format("image/gif"), VariantFormat::Gif);
    }

    #[test]
    fn non_web_safe_source_defaults_to_png() {
        let t = Transformation::default();
        assert_eq!(t.output_format("image/tiff"), VariantFormat::Png);
        assert_eq!(t.output_format("image/bmp"), VariantFormat::Png);
    }

    #[test]
    fn representable_is_false_for_documents() {
        assert!(representable("image/png"));
        assert!(representable("image/tiff"));
        assert!(!representable(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!representable("application/pdf"));
        assert!(!representable("video/mp4"));
    }

    #[test]
    fn variant_keys_nest_under_blob_key() {
        assert_eq!(
            variant_key("abc123", "deadbeef"),
            "variants/abc123/deadbeef"
        );
    }
}
