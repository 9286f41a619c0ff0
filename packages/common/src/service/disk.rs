use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};

use crate::checksum::Checksum;
use crate::key::validate_key;
use crate::signed::{TokenPurpose, TokenSigner};

use super::error::ServiceError;
use super::{BlobService, BoxReader, DirectUpload, Disposition, encode_path_segment};

/// Token payload for a signed disk read URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiskReadClaims {
    /// Name of the disk service holding the object.
    pub service: String,
    pub key: String,
    pub content_type: String,
    pub disposition: Disposition,
}

/// Token payload for a signed disk upload URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiskUploadClaims {
    /// Name of the disk service the upload lands on.
    pub service: String,
    pub key: String,
    pub content_type: String,
    pub content_length: u64,
    pub checksum: Checksum,
}

/// Filesystem-backed storage service.
///
/// Objects live in a sharded directory layout,
/// `{root}/{key[0..2]}/{key[2..4]}/{key}`, and are written via a temp file
/// plus rename so a crash mid-write never leaves a partial object in place.
///
/// Signed URLs point back at the application (`/disk/...` endpoints), since
/// the filesystem itself cannot serve HTTP.
pub struct DiskService {
    name: String,
    root: PathBuf,
    public_base: String,
    signer: Arc<TokenSigner>,
}

impl DiskService {
    pub async fn new(
        name: impl Into<String>,
        root: PathBuf,
        public_base: impl Into<String>,
        signer: Arc<TokenSigner>,
    ) -> Result<Self, ServiceError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self {
            name: name.into(),
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ServiceError> {
        if !validate_key(key) {
            return Err(ServiceError::InvalidKey(key.to_string()));
        }
        // Variant keys contain slashes; the shard prefix still comes from
        // the leading characters so related objects stay co-located.
        Ok(self.root.join(&key[0..2]).join(&key[2..4]).join(key))
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl BlobService for DiskService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        checksum: &Checksum,
        _content_type: &str,
    ) -> Result<(), ServiceError> {
        checksum.verify(data)?;

        let object_path = self.object_path(key)?;
        let temp_path = self.temp_path();

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get_range(
        &self,
        key: &str,
        range: std::ops::Range<u64>,
    ) -> Result<Vec<u8>, ServiceError> {
        let object_path = self.object_path(key)?;
        let mut file = match fs::File::open(&object_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        file.seek(std::io::SeekFrom::Start(range.start)).await?;
        let len = range.end.saturating_sub(range.start);
        let mut buf = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn stream(&self, key: &str) -> Result<BoxReader, ServiceError> {
        let object_path = self.object_path(key)?;
        match fs::File::open(&object_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
        let object_path = self.object_path(key)?;
        Ok(fs::try_exists(&object_path).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let object_path = self.object_path(key)?;
        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
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
        let claims = DiskReadClaims {
            service: self.name.clone(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            disposition,
        };
        let token = self
            .signer
            .sign(TokenPurpose::DiskRead, &claims, expires_in)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(format!(
            "{}/disk/{token}/{}",
            self.public_base,
            encode_path_segment(filename)
        ))
    }

    async fn url_for_direct_upload(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
        content_length: u64,
        checksum: &Checksum,
    ) -> Result<DirectUpload, ServiceError> {
        let claims = DiskUploadClaims {
            service: self.name.clone(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            content_length,
            checksum: *checksum,
        };
        let token = self
            .signer
            .sign(TokenPurpose::DiskUpload, &claims, expires_in)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let mut headers = std::collections::HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        headers.insert("Content-Length".to_string(), content_length.to_string());

        Ok(DirectUpload {
            url: format!("{}/disk/{token}", self.public_base),
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_key;

    async fn temp_service() -> (DiskService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let signer = Arc::new(TokenSigner::new(b"disk-test-secret"));
        let service = DiskService::new(
            "local",
            dir.path().join("storage"),
            "http://localhost:3000",
            signer,
        )
        .await
        .unwrap();
        (service, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let data = b"hello world";
        let checksum = Checksum::compute(data);

        service.put(&key, data, &checksum, "text/plain").await.unwrap();
        let retrieved = service.get(&key).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn checksum_mismatch_rejects_write() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let wrong = Checksum::compute(b"other bytes");

        let result = service.put(&key, b"actual bytes", &wrong, "text/plain").await;
        assert!(matches!(
            result,
            Err(ServiceError::ChecksumMismatch { .. })
        ));
        assert!(!service.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn sharded_layout() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let data = b"shard test";
        service
            .put(&key, data, &Checksum::compute(data), "text/plain")
            .await
            .unwrap();

        let expected = service
            .root
            .join(&key[0..2])
            .join(&key[2..4])
            .join(&key);
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn get_range_returns_slice() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let data = b"0123456789";
        service
            .put(&key, data, &Checksum::compute(data), "text/plain")
            .await
            .unwrap();

        let part = service.get_range(&key, 2..6).await.unwrap();
        assert_eq!(part, b"2345");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (service, _dir) = temp_service().await;
        let result = service.get(&generate_key()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let data = b"delete me";
        service
            .put(&key, data, &Checksum::compute(data), "text/plain")
            .await
            .unwrap();

        service.delete(&key).await.unwrap();
        assert!(!service.exists(&key).await.unwrap());
        // Second delete of a now-missing key still succeeds.
        service.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn variant_keys_nest_under_shards() {
        let (service, _dir) = temp_service().await;
        let key = format!("variants/{}/abcdef0123456789", generate_key());
        let data = b"variant bytes";
        service
            .put(&key, data, &Checksum::compute(data), "image/png")
            .await
            .unwrap();
        assert_eq!(service.get(&key).await.unwrap(), data);
    }

    #[tokio::test]
    async fn traversal_key_rejected() {
        let (service, _dir) = temp_service().await;
        let result = service.get("../../etc/passwd").await;
        assert!(matches!(result, Err(ServiceError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn read_url_is_verifiable() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let url = service
            .url_for_read(
                &key,
                Duration::from_secs(300),
                "photo.jpg",
                "image/jpeg",
                Disposition::Inline,
            )
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:3000/disk/"));
        let token = url
            .strip_prefix("http://localhost:3000/disk/")
            .unwrap()
            .split('/')
            .next()
            .unwrap();
        let claims: DiskReadClaims = service
            .signer
            .verify(TokenPurpose::DiskRead, token)
            .unwrap();
        assert_eq!(claims.service, "local");
        assert_eq!(claims.key, key);
        assert_eq!(claims.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn direct_upload_url_carries_headers() {
        let (service, _dir) = temp_service().await;
        let key = generate_key();
        let checksum = Checksum::compute(b"upload body");
        let upload = service
            .url_for_direct_upload(&key, Duration::from_secs(300), "text/plain", 11, &checksum)
            .await
            .unwrap();

        assert_eq!(upload.headers.get("Content-Type").unwrap(), "text/plain");
        assert_eq!(upload.headers.get("Content-Length").unwrap(), "11");

        let token = upload
            .url
            .strip_prefix("http://localhost:3000/disk/")
            .unwrap();
        let claims: DiskUploadClaims = service
            .signer
            .verify(TokenPurpose::DiskUpload, token)
            .unwrap();
        assert_eq!(claims.service, "local");
        assert_eq!(claims.key, key);
        assert_eq!(claims.checksum, checksum);
    }
}
