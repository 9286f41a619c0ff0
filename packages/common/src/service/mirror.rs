use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::checksum::Checksum;

use super::error::ServiceError;
use super::{BlobService, BoxReader, DirectUpload, Disposition};

/// Composite service that fans writes out to a primary and a set of
/// best-effort secondaries. All reads come from the primary.
///
/// A primary failure aborts the whole write. Secondary failures are logged
/// and left for reconciliation; requiring every replica to succeed would
/// make the primary only as available as its least reliable mirror.
pub struct MirrorService {
    name: String,
    primary: Arc<dyn BlobService>,
    secondaries: Vec<Arc<dyn BlobService>>,
    secondary_timeout: Duration,
}

impl MirrorService {
    pub fn new(
        name: impl Into<String>,
        primary: Arc<dyn BlobService>,
        secondaries: Vec<Arc<dyn BlobService>>,
        secondary_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            primary,
            secondaries,
            secondary_timeout,
        }
    }

    pub fn primary(&self) -> &Arc<dyn BlobService> {
        &self.primary
    }

    /// Copy `key` from the primary to every secondary missing it.
    ///
    /// Used by the deferred replication job after direct uploads, and by
    /// `mirror-verify --repair`. Idempotent: already-replicated secondaries
    /// are skipped.
    pub async fn replicate(&self, key: &str, content_type: &str) -> Result<(), ServiceError> {
        let data = self.primary.get(key).await?;
        let checksum = Checksum::compute(&data);

        for secondary in &self.secondaries {
            match secondary.exists(key).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        service = secondary.name(),
                        key, error = %e,
                        "mirror replication: existence check failed"
                    );
                    continue;
                }
            }

            if let Err(e) = secondary.put(key, &data, &checksum, content_type).await {
                warn!(
                    service = secondary.name(),
                    key, error = %e,
                    "mirror replication: secondary write failed"
                );
            }
        }
        Ok(())
    }

    /// Names of secondaries that do not hold `key` (or could not be
    /// checked). Reconciliation sweep primitive.
    pub async fn missing_on(&self, key: &str) -> Vec<String> {
        let mut missing = Vec::new();
        for secondary in &self.secondaries {
            match secondary.exists(key).await {
                Ok(true) => {}
                Ok(false) => missing.push(secondary.name().to_string()),
                Err(e) => {
                    warn!(
                        service = secondary.name(),
                        key, error = %e,
                        "mirror verify: existence check failed"
                    );
                    missing.push(secondary.name().to_string());
                }
            }
        }
        missing
    }

    async fn mirror_write(&self, key: &str, data: &[u8], checksum: &Checksum, content_type: &str) {
        let writes = self.secondaries.iter().map(|secondary| {
            let secondary = Arc::clone(secondary);
            let key = key.to_string();
            let content_type = content_type.to_string();
            let data = data.to_vec();
            let checksum = *checksum;
            let timeout = self.secondary_timeout;
            async move {
                let result = tokio::time::timeout(
                    timeout,
                    secondary.put(&key, &data, &checksum, &content_type),
                )
                .await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        service = secondary.name(),
                        key, error = %e,
                        "mirror write to secondary failed"
                    ),
                    Err(_) => warn!(
                        service = secondary.name(),
                        key, "mirror write to secondary timed out"
                    ),
                }
            }
        });
        join_all(writes).await;
    }
}

#[async_trait]
impl BlobService for MirrorService {
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
        // Primary first; its failure aborts before any secondary is touched.
        self.primary.put(key, data, checksum, content_type).await?;
        self.mirror_write(key, data, checksum, content_type).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        self.primary.get(key).await
    }

    async fn get_range(
        &self,
        key: &str,
        range: std::ops::Range<u64>,
    ) -> Result<Vec<u8>, ServiceError> {
        self.primary.get_range(key, range).await
    }

    async fn stream(&self, key: &str) -> Result<BoxReader, ServiceError> {
        self.primary.stream(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
        self.primary.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let primary_result = self.primary.delete(key).await;
        if let Err(e) = &primary_result {
            warn!(service = self.primary.name(), key, error = %e, "mirror delete: primary failed");
        }

        for secondary in &self.secondaries {
            if let Err(e) = secondary.delete(key).await {
                // Logged, not retried inline; the purge job is idempotent
                // and the sweep will find stragglers.
                warn!(
                    service = secondary.name(),
                    key, error = %e,
                    "mirror delete: secondary failed"
                );
            }
        }

        primary_result
    }

    async fn url_for_read(
        &self,
        key: &str,
        expires_in: Duration,
        filename: &str,
        content_type: &str,
        disposition: Disposition,
    ) -> Result<String, ServiceError> {
        self.primary
            .url_for_read(key, expires_in, filename, content_type, disposition)
            .await
    }

    async fn url_for_direct_upload(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
        content_length: u64,
        checksum: &Checksum,
    ) -> Result<DirectUpload, ServiceError> {
        // Uploads always land on the primary; replication is deferred.
        self.primary
            .url_for_direct_upload(key, expires_in, content_type, content_length, checksum)
            .await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::test_support::TestService;
    use super::*;

    fn mirror(
        primary: Arc<TestService>,
        secondaries: Vec<Arc<TestService>>,
    ) -> MirrorService {
        MirrorService::new(
            "mirrored",
            primary as Arc<dyn BlobService>,
            secondaries
                .into_iter()
                .map(|s| s as Arc<dyn BlobService>)
                .collect(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn put_writes_primary_and_secondaries() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        let service = mirror(Arc::clone(&primary), vec![Arc::clone(&west)]);

        let data = b"mirrored bytes";
        service
            .put("somekey1234", data, &Checksum::compute(data), "text/plain")
            .await
            .unwrap();

        assert!(primary.contains("somekey1234"));
        assert!(west.contains("somekey1234"));
    }

    #[tokio::test]
    async fn primary_failure_prevents_secondary_writes() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        primary.fail_writes.store(true, Ordering::SeqCst);
        let service = mirror(Arc::clone(&primary), vec![Arc::clone(&west)]);

        let data = b"doomed";
        let result = service
            .put("somekey1234", data, &Checksum::compute(data), "text/plain")
            .await;

        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert_eq!(west.put_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn secondary_failure_does_not_fail_put() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        west.fail_writes.store(true, Ordering::SeqCst);
        let service = mirror(Arc::clone(&primary), vec![Arc::clone(&west)]);

        let data = b"best effort";
        service
            .put("somekey1234", data, &Checksum::compute(data), "text/plain")
            .await
            .unwrap();

        assert!(primary.contains("somekey1234"));
        assert!(!west.contains("somekey1234"));
    }

    #[tokio::test]
    async fn reads_come_from_primary() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        primary.insert_raw("somekey1234", b"primary copy");
        west.insert_raw("somekey1234", b"stale copy");
        let service = mirror(Arc::clone(&primary), vec![Arc::clone(&west)]);

        assert_eq!(service.get("somekey1234").await.unwrap(), b"primary copy");
    }

    #[tokio::test]
    async fn delete_fans_out() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        primary.insert_raw("somekey1234", b"x");
        west.insert_raw("somekey1234", b"x");
        let service = mirror(Arc::clone(&primary), vec![Arc::clone(&west)]);

        service.delete("somekey1234").await.unwrap();
        assert!(!primary.contains("somekey1234"));
        assert!(!west.contains("somekey1234"));
    }

    #[tokio::test]
    async fn replicate_fills_missing_secondaries_only() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        let south = TestService::new("south");
        primary.insert_raw("somekey1234", b"payload");
        south.insert_raw("somekey1234", b"payload");
        let service = mirror(
            Arc::clone(&primary),
            vec![Arc::clone(&west), Arc::clone(&south)],
        );

        service.replicate("somekey1234", "text/plain").await.unwrap();

        assert!(west.contains("somekey1234"));
        // Already-replicated secondary was not rewritten.
        assert_eq!(south.put_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_on_reports_offline_secondary() {
        let primary = TestService::new("east");
        let west = TestService::new("west");
        primary.insert_raw("somekey1234", b"payload");
        west.fail_writes.store(true, Ordering::SeqCst);
        let service = mirror(Arc::clone(&primary), vec![Arc::clone(&west)]);

        let missing = service.missing_on("somekey1234").await;
        assert_eq!(missing, vec!["west".to_string()]);
    }
}
