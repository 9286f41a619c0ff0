mod error;

pub mod disk;
pub mod mirror;
pub mod registry;
pub mod s3;

pub use error::ServiceError;

use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::checksum::Checksum;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Default expiry for signed read URLs.
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(300);

/// How a delivered file should be presented by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }

    /// Build a `Content-Disposition` header value with an ASCII fallback
    /// name and an RFC 5987 `filename*` for everything else.
    pub fn header_value(&self, filename: &str) -> String {
        let ascii_safe: String = filename
            .chars()
            .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
            .collect();
        let ascii_name = if ascii_safe.is_empty() {
            "download".to_string()
        } else {
            ascii_safe
        };

        let encoded: String = filename
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z'
                | b'a'..=b'z'
                | b'0'..=b'9'
                | b'!'
                | b'#'
                | b'$'
                | b'&'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~' => String::from(b as char),
                _ => format!("%{b:02X}"),
            })
            .collect();

        format!(
            "{}; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}",
            self.as_str()
        )
    }
}

/// Percent-encode a filename for use as a URL path segment.
pub fn encode_path_segment(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                String::from(b as char)
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Everything a client needs to upload bytes directly to a backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DirectUpload {
    /// Presigned upload URL. Always targets the primary when the service is
    /// a mirror; replication to secondaries happens later.
    pub url: String,
    /// Headers the client must send with the upload request.
    pub headers: HashMap<String, String>,
}

/// Uniform interface over a physical storage backend.
///
/// Writes are durable when `put` returns; nothing is buffered across calls.
#[async_trait]
pub trait BlobService: Send + Sync {
    /// The configured service name this adapter was registered under.
    fn name(&self) -> &str;

    /// Store bytes under `key`, verifying them against `checksum` first.
    ///
    /// A checksum mismatch rejects the write and leaves no partial object.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        checksum: &Checksum,
        content_type: &str,
    ) -> Result<(), ServiceError>;

    /// Retrieve all bytes for `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let mut reader = self.stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a byte range (start inclusive, end exclusive).
    async fn get_range(&self, key: &str, range: Range<u64>) -> Result<Vec<u8>, ServiceError>;

    /// Retrieve the object as a streaming async reader.
    async fn stream(&self, key: &str) -> Result<BoxReader, ServiceError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool, ServiceError>;

    /// Delete the object. Deleting a missing key is a success.
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;

    /// Issue a short-lived signed URL for reading the object.
    async fn url_for_read(
        &self,
        key: &str,
        expires_in: Duration,
        filename: &str,
        content_type: &str,
        disposition: Disposition,
    ) -> Result<String, ServiceError>;

    /// Issue a signed URL (plus required headers) for a client-side upload.
    async fn url_for_direct_upload(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
        content_length: u64,
        checksum: &Checksum,
    ) -> Result<DirectUpload, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_disposition_for_plain_filename() {
        let value = Disposition::Inline.header_value("photo.jpg");
        assert_eq!(
            value,
            "inline; filename=\"photo.jpg\"; filename*=UTF-8''photo.jpg"
        );
    }

    #[test]
    fn attachment_disposition_escapes_quotes() {
        let value = Disposition::Attachment.header_value("we\"ird;.bin");
        assert!(value.starts_with("attachment; filename=\"weird.bin\""));
    }

    #[test]
    fn non_ascii_filename_gets_fallback() {
        let value = Disposition::Inline.header_value("日本語.png");
        assert!(value.contains("filename=\".png\"") || value.contains("filename=\"download\""));
        assert!(value.contains("filename*=UTF-8''%E6%97%A5"));
    }
}
