use std::time::Duration;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};
use uuid::Uuid;

use common::checksum::Checksum;

use crate::blobs;
use crate::context::Context;
use crate::entity::{blob, variant_record};
use crate::error::CoreError;
use crate::variants::single_flight::KeyedLocks;
use crate::variants::{Transformation, representable, transformer, variant_key};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces and caches transformed renditions of image blobs.
///
/// Generation is single-flight per (blob, transformation): under a thundering
/// herd the first request transforms and stores, the rest wait and reuse the
/// stored artifact. Waiters that outlast the lock timeout are rejected with a
/// retryable contention error instead of queueing unboundedly.
pub struct VariantEngine {
    locks: KeyedLocks<(Uuid, String)>,
    lock_timeout: Duration,
}

impl VariantEngine {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            locks: KeyedLocks::new(),
            lock_timeout,
        }
    }

    /// Return the variant record for `transformation`, generating and
    /// storing the artifact on first request.
    #[instrument(skip(self, ctx, blob, transformation), fields(blob_id = %blob.id))]
    pub async fn variant_for(
        &self,
        ctx: &Context,
        blob: &blob::Model,
        transformation: &Transformation,
    ) -> Result<variant_record::Model, CoreError> {
        if !representable(&blob.content_type) {
            return Err(CoreError::Unrepresentable(format!(
                "cannot transform {}",
                blob.content_type
            )));
        }

        let digest = transformation.digest();
        let service = blobs::service_for(ctx, blob)?;

        // Fast path: record exists and the artifact is still there.
        if let Some(record) = find_record(ctx, blob.id, &digest).await? {
            if service.exists(&record.key).await? {
                return Ok(record);
            }
        }

        let lock_key = (blob.id, digest.clone());
        let guard = self
            .locks
            .acquire(lock_key.clone(), self.lock_timeout)
            .await
            .map_err(|_| CoreError::Contended)?;

        let result = self
            .generate_locked(ctx, blob, transformation, &digest, service.as_ref())
            .await;

        drop(guard);
        self.locks.release(&lock_key);
        result
    }

    async fn generate_locked(
        &self,
        ctx: &Context,
        blob: &blob::Model,
        transformation: &Transformation,
        digest: &str,
        service: &dyn common::service::BlobService,
    ) -> Result<variant_record::Model, CoreError> {
        // A racing request may have finished while we waited for the lock.
        if let Some(record) = find_record(ctx, blob.id, digest).await? {
            if service.exists(&record.key).await? {
                return Ok(record);
            }
        }

        let source = service.get(&blob.key).await?;

        let transformation = transformation.clone();
        let content_type = blob.content_type.clone();
        let output = tokio::task::spawn_blocking(move || {
            transformer::transform(&source, &transformation, &content_type)
        })
        .await
        .map_err(|e| CoreError::Processing(format!("transform task died: {e}")))??;

        let key = variant_key(&blob.key, digest);
        let checksum = Checksum::compute(&output.bytes);
        service
            .put(&key, &output.bytes, &checksum, &output.content_type)
            .await?;

        let model = variant_record::ActiveModel {
            id: Set(Uuid::now_v7()),
            blob_id: Set(blob.id),
            variation_digest: Set(digest.to_string()),
            key: Set(key.clone()),
            byte_size: Set(output.bytes.len() as i64),
            content_type: Set(output.content_type.clone()),
            created_at: Set(Utc::now()),
        };
        // A concurrent writer on another node may have inserted the same
        // record; the artifact bytes are identical either way.
        variant_record::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    variant_record::Column::BlobId,
                    variant_record::Column::VariationDigest,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&ctx.db)
            .await?;

        let record = find_record(ctx, blob.id, digest)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("variant {key}")))?;

        info!(blob_id = %blob.id, key = %record.key, "variant generated");
        Ok(record)
    }
}

impl Default for VariantEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn find_record(
    ctx: &Context,
    blob_id: Uuid,
    digest: &str,
) -> Result<Option<variant_record::Model>, CoreError> {
    Ok(variant_record::Entity::find()
        .filter(variant_record::Column::BlobId.eq(blob_id))
        .filter(variant_record::Column::VariationDigest.eq(digest))
        .one(&ctx.db)
        .await?)
}
