/// Determine a blob's content type from its bytes, falling back to the
/// filename extension, then `application/octet-stream`.
///
/// Magic-byte detection wins over the extension so a renamed file cannot be
/// served under a misleading type.
pub fn sniff_content_type(bytes: &[u8], filename: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_magic_bytes_win_over_extension() {
        // Minimal JPEG header (SOI + APP0 marker).
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0");
        bytes.resize(64, 0);
        assert_eq!(sniff_content_type(&bytes, "mislabeled.txt"), "image/jpeg");
    }

    #[test]
    fn png_magic_bytes_detected() {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(64, 0);
        assert_eq!(sniff_content_type(&bytes, "unknown"), "image/png");
    }

    #[test]
    fn extension_fallback_for_text() {
        assert_eq!(sniff_content_type(b"hello world", "notes.txt"), "text/plain");
    }

    #[test]
    fn octet_stream_when_nothing_matches() {
        assert_eq!(
            sniff_content_type(b"random bytes", "mystery"),
            "application/octet-stream"
        );
    }
}
