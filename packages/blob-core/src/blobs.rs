use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use common::checksum::Checksum;
use common::jobs::StorageJob;
use common::key::generate_key;
use common::service::{BlobService, DirectUpload, Disposition};

use crate::context::Context;
use crate::entity::{attachment, blob, variant_record};
use crate::error::CoreError;
use crate::sniff::sniff_content_type;

/// Parameters for a server-side blob creation.
pub struct NewBlob<'a> {
    pub bytes: &'a [u8],
    pub filename: String,
    /// Declared type; used as-is when `identify` is false, as a fallback
    /// when sniffing is inconclusive otherwise.
    pub content_type: Option<String>,
    /// Sniff the content type from the bytes. Default behavior.
    pub identify: bool,
}

/// Resolve the service a blob's bytes live on.
pub fn service_for(ctx: &Context, blob: &blob::Model) -> Result<Arc<dyn BlobService>, CoreError> {
    ctx.services
        .get(&blob.service_name)
        .ok_or_else(|| CoreError::UnknownService(blob.service_name.clone()))
}

/// Store bytes and record the blob.
///
/// Creation is two-phase: the backend write completes (durable) before the
/// metadata row is inserted, so a crash in between leaves only an orphaned
/// object, never a row pointing at nothing.
#[instrument(skip(ctx, new), fields(filename = %new.filename, size = new.bytes.len()))]
pub async fn create_blob(ctx: &Context, new: NewBlob<'_>) -> Result<blob::Model, CoreError> {
    if new.bytes.len() as u64 > ctx.max_blob_size {
        return Err(CoreError::Validation(format!(
            "blob exceeds size limit ({} > {} bytes)",
            new.bytes.len(),
            ctx.max_blob_size
        )));
    }

    let content_type = resolve_content_type(
        new.bytes,
        &new.filename,
        new.content_type.as_deref(),
        new.identify,
    );

    let checksum = Checksum::compute(new.bytes);
    let key = generate_key();
    let service = ctx.services.default_service();

    service
        .put(&key, new.bytes, &checksum, &content_type)
        .await?;

    let model = blob::ActiveModel {
        id: Set(Uuid::now_v7()),
        key: Set(key.clone()),
        filename: Set(new.filename),
        content_type: Set(content_type),
        byte_size: Set(new.bytes.len() as i64),
        checksum: Set(checksum.to_hex()),
        service_name: Set(service.name().to_string()),
        created_at: Set(Utc::now()),
    };

    let insert = blob::Entity::insert(model).exec_with_returning(&ctx.db).await;
    match insert {
        Ok(saved) => {
            info!(blob_id = %saved.id, key = %saved.key, "blob created");
            Ok(saved)
        }
        Err(e) => {
            // The row never landed; clean up the bytes so the object store
            // doesn't accumulate unreachable objects.
            if let Err(del) = service.delete(&key).await {
                warn!(key, error = %del, "failed to clean up bytes after insert failure");
            }
            Err(e.into())
        }
    }
}

/// Record a blob and issue a presigned upload URL for the client.
///
/// The URL always targets the primary backend; mirror fan-out happens via a
/// deferred replication job once the blob is attached. Blobs whose upload is
/// abandoned stay unattached and are reclaimed by the maintenance sweep.
#[instrument(skip(ctx))]
pub async fn create_for_direct_upload(
    ctx: &Context,
    filename: String,
    content_type: String,
    byte_size: u64,
    checksum: Checksum,
) -> Result<(blob::Model, DirectUpload), CoreError> {
    if byte_size > ctx.max_blob_size {
        return Err(CoreError::Validation(format!(
            "declared size exceeds limit ({byte_size} > {} bytes)",
            ctx.max_blob_size
        )));
    }

    let key = generate_key();
    let service = ctx.services.default_service();

    let upload = service
        .url_for_direct_upload(
            &key,
            Duration::from_secs(ctx.url_expiry_secs),
            &content_type,
            byte_size,
            &checksum,
        )
        .await?;

    let model = blob::ActiveModel {
        id: Set(Uuid::now_v7()),
        key: Set(key),
        filename: Set(filename),
        content_type: Set(content_type),
        byte_size: Set(byte_size as i64),
        checksum: Set(checksum.to_hex()),
        service_name: Set(service.name().to_string()),
        created_at: Set(Utc::now()),
    };
    let saved = blob::Entity::insert(model).exec_with_returning(&ctx.db).await?;

    info!(blob_id = %saved.id, "direct upload prepared");
    Ok((saved, upload))
}

pub async fn find(ctx: &Context, id: Uuid) -> Result<blob::Model, CoreError> {
    blob::Entity::find_by_id(id)
        .one(&ctx.db)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))
}

/// Issue a signed read URL for a blob's bytes.
pub async fn url_for_blob(
    ctx: &Context,
    blob: &blob::Model,
    disposition: Disposition,
) -> Result<String, CoreError> {
    let service = service_for(ctx, blob)?;
    Ok(service
        .url_for_read(
            &blob.key,
            Duration::from_secs(ctx.url_expiry_secs),
            &blob.filename,
            &blob.content_type,
            disposition,
        )
        .await?)
}

/// Delete a blob's backend bytes, its variants, and its rows.
///
/// Idempotent: missing rows or already-deleted objects are successes, so a
/// redelivered purge job or a second sweep pass cannot fail.
#[instrument(skip(ctx))]
pub async fn purge(ctx: &Context, blob_id: Uuid) -> Result<(), CoreError> {
    let Some(blob) = blob::Entity::find_by_id(blob_id).one(&ctx.db).await? else {
        return Ok(());
    };

    let service = service_for(ctx, &blob)?;

    // Variants cascade with their source blob.
    let variants = variant_record::Entity::find()
        .filter(variant_record::Column::BlobId.eq(blob_id))
        .all(&ctx.db)
        .await?;
    for variant in &variants {
        service.delete(&variant.key).await?;
    }
    variant_record::Entity::delete_many()
        .filter(variant_record::Column::BlobId.eq(blob_id))
        .exec(&ctx.db)
        .await?;

    service.delete(&blob.key).await?;

    attachment::Entity::delete_many()
        .filter(attachment::Column::BlobId.eq(blob_id))
        .exec(&ctx.db)
        .await?;
    blob::Entity::delete_by_id(blob_id).exec(&ctx.db).await?;

    info!(blob_id = %blob_id, key = %blob.key, variants = variants.len(), "blob purged");
    Ok(())
}

/// Enqueue a purge, or run it inline when the queue is disabled.
///
/// User-facing deletes must not block on a potentially slow remote-storage
/// round trip.
pub async fn purge_later(ctx: &Context, blob_id: Uuid) -> Result<(), CoreError> {
    let enqueued = ctx.enqueue(&StorageJob::PurgeBlob { blob_id }).await?;
    if !enqueued {
        purge(ctx, blob_id).await?;
    }
    Ok(())
}

/// Purge blobs that were never attached and are older than the cutoff.
///
/// Covers abandoned direct uploads and blobs whose owners vanished. Returns
/// the affected blobs; with `dry_run` nothing is deleted.
pub async fn purge_unattached(
    ctx: &Context,
    cutoff: DateTime<Utc>,
    dry_run: bool,
) -> Result<Vec<blob::Model>, CoreError> {
    use sea_orm::sea_query::Query;

    let attached = Query::select()
        .column(attachment::Column::BlobId)
        .from(attachment::Entity)
        .to_owned();

    let stale = blob::Entity::find()
        .filter(blob::Column::CreatedAt.lt(cutoff))
        .filter(blob::Column::Id.not_in_subquery(attached))
        .all(&ctx.db)
        .await?;

    if !dry_run {
        for blob in &stale {
            purge(ctx, blob.id).await?;
        }
    }

    Ok(stale)
}

fn resolve_content_type(
    bytes: &[u8],
    filename: &str,
    declared: Option<&str>,
    identify: bool,
) -> String {
    if !identify {
        return declared.unwrap_or("application/octet-stream").to_string();
    }
    let sniffed = sniff_content_type(bytes, filename);
    if sniffed == "application/octet-stream" {
        if let Some(declared) = declared {
            return declared.to_string();
        }
    }
    sniffed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_sniffs_jpeg_despite_declaration() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        jpeg.extend_from_slice(b"JFIF\0");
        jpeg.resize(10 * 1024, 0);
        assert_eq!(
            resolve_content_type(&jpeg, "photo", None, true),
            "image/jpeg"
        );
        assert_eq!(
            resolve_content_type(&jpeg, "photo", Some("text/plain"), true),
            "image/jpeg"
        );
    }

    #[test]
    fn identify_false_trusts_caller() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(
            resolve_content_type(&jpeg, "photo", Some("application/x-custom"), false),
            "application/x-custom"
        );
        assert_eq!(
            resolve_content_type(&jpeg, "photo", None, false),
            "application/octet-stream"
        );
    }

    #[test]
    fn inconclusive_sniff_falls_back_to_declared() {
        assert_eq!(
            resolve_content_type(b"plain bytes", "mystery", Some("application/x-thing"), true),
            "application/x-thing"
        );
    }
}
