use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::error::CoreError;
use crate::variants::{Transformation, VariantFormat};

const DEFAULT_JPEG_QUALITY: u8 = 80;

/// The encoded variant plus the type it should be served under.
#[derive(Debug)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Decode, resize, and re-encode. CPU-bound; callers run this on a
/// blocking thread.
///
/// A source that fails to decode is reported as unrepresentable, not as an
/// internal error: corrupt uploads are a caller problem.
pub fn transform(
    bytes: &[u8],
    transformation: &Transformation,
    source_content_type: &str,
) -> Result<TransformOutput, CoreError> {
    let transformation = transformation.normalized();

    let img = image::load_from_memory(bytes)
        .map_err(|e| CoreError::Unrepresentable(format!("failed to decode image: {e}")))?;

    let img = match transformation.resize_to_limit {
        Some((max_w, max_h)) => {
            let (w, h) = img.dimensions();
            if w > max_w || h > max_h {
                img.thumbnail(max_w, max_h)
            } else {
                img
            }
        }
        None => img,
    };

    let format = transformation.output_format(source_content_type);
    let bytes = encode(&img, format, transformation.quality)?;

    debug!(
        format = format.mime_type(),
        size = bytes.len(),
        "variant encoded"
    );
    Ok(TransformOutput {
        bytes,
        content_type: format.mime_type().to_string(),
    })
}

fn encode(
    img: &DynamicImage,
    format: VariantFormat,
    quality: Option<u8>,
) -> Result<Vec<u8>, CoreError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        VariantFormat::Jpeg => {
            // JPEG has no alpha channel; flatten before encoding.
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(
                &mut out,
                quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            );
            rgb.write_with_encoder(encoder)
                .map_err(|e| CoreError::Unrepresentable(format!("failed to encode image: {e}")))?;
        }
        _ => {
            img.write_to(&mut out, format.image_format())
                .map_err(|e| CoreError::Unrepresentable(format!("failed to encode image: {e}")))?;
        }
    }
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn resize_to_limit_shrinks_preserving_aspect() {
        let src = sample_png(200, 100);
        let t = Transformation {
            resize_to_limit: Some((100, 100)),
            ..Default::default()
        };
        let result = transform(&src, &t, "image/png").unwrap();
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
        assert_eq!(result.content_type, "image/png");
    }

    #[test]
    fn resize_never_upscales() {
        let src = sample_png(50, 50);
        let t = Transformation {
            resize_to_limit: Some((400, 400)),
            ..Default::default()
        };
        let result = transform(&src, &t, "image/png").unwrap();
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (50, 50));
    }

    #[test]
    fn format_conversion_to_jpeg() {
        let src = sample_png(32, 32);
        let t = Transformation {
            format: Some(VariantFormat::Jpeg),
            quality: Some(70),
            ..Default::default()
        };
        let result = transform(&src, &t, "image/png").unwrap();
        assert_eq!(result.content_type, "image/jpeg");
        let decoded = image::guess_format(&result.bytes).unwrap();
        assert_eq!(decoded, ImageFormat::Jpeg);
    }

    #[test]
    fn corrupt_source_is_unrepresentable() {
        let t = Transformation::default();
        let err = transform(b"not an image at all", &t, "image/png").unwrap_err();
        assert!(matches!(err, CoreError::Unrepresentable(_)));
    }
}
