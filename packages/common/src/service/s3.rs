use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;
use http::header::HeaderName;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use crate::checksum::Checksum;
use crate::key::validate_key;

use super::error::ServiceError;
use super::{BlobService, BoxReader, DirectUpload, Disposition};

/// Connection parameters for one S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for MinIO-style deployments.
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    pub request_timeout: Duration,
}

/// Object-store service backed by an S3-compatible bucket.
///
/// All requests carry the configured bounded timeout so one slow backend
/// cannot pin a worker indefinitely.
pub struct S3Service {
    name: String,
    bucket: Box<Bucket>,
}

impl S3Service {
    pub fn new(name: impl Into<String>, opts: &S3Options) -> Result<Self, ServiceError> {
        let region = match &opts.endpoint {
            Some(endpoint) => Region::Custom {
                region: opts.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => opts
                .region
                .parse()
                .map_err(|_| ServiceError::Unavailable(format!("bad region: {}", opts.region)))?,
        };

        let credentials = Credentials::new(
            Some(&opts.access_key),
            Some(&opts.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| ServiceError::Unavailable(format!("bad credentials: {e}")))?;

        let mut bucket = Bucket::new(&opts.bucket, region, credentials)
            .map_err(|e| ServiceError::Unavailable(format!("bucket init: {e}")))?;
        if opts.path_style {
            bucket = bucket.with_path_style();
        }
        bucket.set_request_timeout(Some(opts.request_timeout));

        Ok(Self {
            name: name.into(),
            bucket,
        })
    }

    fn checked_key<'a>(&self, key: &'a str) -> Result<&'a str, ServiceError> {
        if validate_key(key) {
            Ok(key)
        } else {
            Err(ServiceError::InvalidKey(key.to_string()))
        }
    }
}

fn map_s3_error(key: &str, err: S3Error) -> ServiceError {
    match err {
        S3Error::HttpFailWithBody(404, _) => ServiceError::NotFound(key.to_string()),
        other => ServiceError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl BlobService for S3Service {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        checksum: &Checksum,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let key = self.checked_key(key)?;
        checksum.verify(data)?;

        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| map_s3_error(key, e))?;

        if !(200..300).contains(&response.status_code()) {
            return Err(ServiceError::Unavailable(format!(
                "put returned HTTP {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let key = self.checked_key(key)?;
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| map_s3_error(key, e))?;
        match response.status_code() {
            200 => Ok(response.to_vec()),
            404 => Err(ServiceError::NotFound(key.to_string())),
            status => Err(ServiceError::Unavailable(format!(
                "get returned HTTP {status}"
            ))),
        }
    }

    async fn get_range(
        &self,
        key: &str,
        range: std::ops::Range<u64>,
    ) -> Result<Vec<u8>, ServiceError> {
        let key = self.checked_key(key)?;
        if range.end <= range.start {
            return Ok(Vec::new());
        }
        // S3 ranges are end-inclusive.
        let response = self
            .bucket
            .get_object_range(key, range.start, Some(range.end - 1))
            .await
            .map_err(|e| map_s3_error(key, e))?;
        match response.status_code() {
            200 | 206 => Ok(response.to_vec()),
            404 => Err(ServiceError::NotFound(key.to_string())),
            status => Err(ServiceError::Unavailable(format!(
                "range get returned HTTP {status}"
            ))),
        }
    }

    async fn stream(&self, key: &str) -> Result<BoxReader, ServiceError> {
        let bytes = self.get(key).await?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
        let key = self.checked_key(key)?;
        match self.bucket.head_object(key).await {
            Ok((_, 200)) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => Err(ServiceError::Unavailable(format!(
                "head returned HTTP {status}"
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(ServiceError::Unavailable(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let key = self.checked_key(key)?;
        match self.bucket.delete_object(key).await {
            Ok(_) => Ok(()),
            // Deleting an absent key is a success.
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(ServiceError::Unavailable(e.to_string())),
        }
    }

    async fn url_for_read(
        &self,
        key: &str,
        expires_in: Duration,
        filename: &str,
        content_type: &str,
        disposition: Disposition,
    ) -> Result<String, ServiceError> {
        let key = self.checked_key(key)?;
        let mut queries = HashMap::new();
        queries.insert(
            "response-content-disposition".to_string(),
            disposition.header_value(filename),
        );
        queries.insert(
            "response-content-type".to_string(),
            content_type.to_string(),
        );

        self.bucket
            .presign_get(key, expires_in.as_secs() as u32, Some(queries))
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))
    }

    async fn url_for_direct_upload(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
        content_length: u64,
        checksum: &Checksum,
    ) -> Result<DirectUpload, ServiceError> {
        let key = self.checked_key(key)?;

        // Signing the checksum header into the URL makes S3 reject uploads
        // whose bytes don't hash to the declared value, matching the
        // verification the disk upload endpoint performs itself.
        let checksum_b64 = BASE64.encode(checksum.as_bytes());
        let mut signed_headers = HeaderMap::new();
        signed_headers.insert(
            HeaderName::from_static("x-amz-checksum-sha256"),
            checksum_b64
                .parse()
                .map_err(|e| ServiceError::Unavailable(format!("checksum header: {e}")))?,
        );

        let url = self
            .bucket
            .presign_put(key, expires_in.as_secs() as u32, Some(signed_headers), None)
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        headers.insert("Content-Length".to_string(), content_length.to_string());
        headers.insert("x-amz-checksum-sha256".to_string(), checksum_b64);

        Ok(DirectUpload { url, headers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options() -> S3Options {
        S3Options {
            bucket: "pantry-test".into(),
            region: "us-east-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            access_key: "minioadmin".into(),
            secret_key: "minioadmin".into(),
            path_style: true,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn constructor_accepts_custom_endpoint() {
        let service = S3Service::new("s3_test", &test_options()).unwrap();
        assert_eq!(service.name(), "s3_test");
    }

    #[tokio::test]
    async fn presigned_read_url_is_signed_and_scoped() {
        let service = S3Service::new("s3_test", &test_options()).unwrap();
        let url = service
            .url_for_read(
                "abcd1234abcd1234abcd1234abcd",
                Duration::from_secs(300),
                "photo.jpg",
                "image/jpeg",
                Disposition::Inline,
            )
            .await
            .unwrap();

        assert!(url.contains("abcd1234abcd1234abcd1234abcd"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=300"));
        assert!(url.contains("response-content-type"));
    }

    #[tokio::test]
    async fn direct_upload_binds_checksum_into_signature() {
        let service = S3Service::new("s3_test", &test_options()).unwrap();
        let checksum = Checksum::compute(b"upload body");
        let upload = service
            .url_for_direct_upload(
                "abcd1234abcd1234abcd1234abcd",
                Duration::from_secs(300),
                "text/plain",
                11,
                &checksum,
            )
            .await
            .unwrap();

        // The checksum header is both required of the client and part of the
        // signed header set, so stripping it invalidates the URL.
        let expected = BASE64.encode(checksum.as_bytes());
        assert_eq!(
            upload.headers.get("x-amz-checksum-sha256").unwrap(),
            &expected
        );
        assert!(upload.url.contains("x-amz-checksum-sha256"));
        assert!(upload.url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn invalid_key_rejected_before_any_request() {
        let service = S3Service::new("s3_test", &test_options()).unwrap();
        let result = service.get("../sneaky").await;
        assert!(matches!(result, Err(ServiceError::InvalidKey(_))));
    }
}
