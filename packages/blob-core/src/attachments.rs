use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};
use tracing::{info, instrument};
use uuid::Uuid;

use common::jobs::StorageJob;

use crate::blobs;
use crate::context::Context;
use crate::entity::{attachment, blob};
use crate::error::CoreError;

/// Polymorphic reference to an owning entity: a type tag plus its ID in
/// canonical string form. Kinds come from the configured registry, not
/// open-ended reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub id: String,
}

impl OwnerRef {
    /// Validate the kind against the known-owner registry. An empty
    /// registry accepts any kind.
    pub fn new(ctx: &Context, kind: &str, id: &str) -> Result<Self, CoreError> {
        if !ctx.owner_kinds.is_empty() && !ctx.owner_kinds.contains(kind) {
            return Err(CoreError::UnknownOwnerKind(kind.to_string()));
        }
        if kind.is_empty() || id.is_empty() {
            return Err(CoreError::Validation(
                "owner kind and id must be non-empty".into(),
            ));
        }
        Ok(Self {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }
}

/// Attach a blob to an owner under a logical name.
///
/// `position` defaults to 0 (single-valued). Re-attaching to an occupied
/// slot atomically swaps the reference; the displaced blob is purged in the
/// background once nothing else references it.
#[instrument(skip(ctx), fields(owner_kind = %owner.kind, owner_id = %owner.id, name))]
pub async fn attach(
    ctx: &Context,
    owner: &OwnerRef,
    name: &str,
    blob_id: Uuid,
    position: Option<i32>,
) -> Result<attachment::Model, CoreError> {
    let blob = blobs::find(ctx, blob_id).await?;
    let position = position.unwrap_or(0);

    let existing = attachment::Entity::find()
        .filter(attachment::Column::OwnerKind.eq(&owner.kind))
        .filter(attachment::Column::OwnerId.eq(&owner.id))
        .filter(attachment::Column::Name.eq(name))
        .filter(attachment::Column::Position.eq(position))
        .one(&ctx.db)
        .await?;

    if let Some(existing) = &existing {
        if existing.blob_id == blob_id {
            return Ok(existing.clone());
        }
    }

    let displaced_blob_id = existing.as_ref().map(|a| a.blob_id);

    // Swap the reference atomically so no window exists where the slot
    // points at nothing.
    let txn = ctx.db.begin().await?;
    if let Some(existing) = &existing {
        attachment::Entity::delete_by_id(existing.id)
            .exec(&txn)
            .await?;
    }
    let model = attachment::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(name.to_string()),
        owner_kind: Set(owner.kind.clone()),
        owner_id: Set(owner.id.clone()),
        blob_id: Set(blob_id),
        position: Set(position),
        created_at: Set(Utc::now()),
    };
    let saved = attachment::Entity::insert(model)
        .exec_with_returning(&txn)
        .await?;
    txn.commit().await?;

    if let Some(old_blob_id) = displaced_blob_id {
        if is_orphaned(ctx, old_blob_id).await? {
            blobs::purge_later(ctx, old_blob_id).await?;
        }
    }

    // Direct uploads only land on the mirror's primary; fan out now that
    // the blob is referenced.
    if ctx.services.mirror(&blob.service_name).is_some() {
        ctx.enqueue(&StorageJob::ReplicateBlob {
            service: blob.service_name.clone(),
            key: blob.key.clone(),
            content_type: blob.content_type.clone(),
        })
        .await?;
    }

    info!(attachment_id = %saved.id, blob_id = %blob_id, "blob attached");
    Ok(saved)
}

/// Remove an attachment row without touching the blob.
pub async fn detach(ctx: &Context, attachment_id: Uuid) -> Result<(), CoreError> {
    attachment::Entity::delete_by_id(attachment_id)
        .exec(&ctx.db)
        .await?;
    Ok(())
}

/// Detach, then purge the blob in the background if nothing else
/// references it.
#[instrument(skip(ctx))]
pub async fn purge_attachment(ctx: &Context, attachment_id: Uuid) -> Result<(), CoreError> {
    let Some(existing) = attachment::Entity::find_by_id(attachment_id)
        .one(&ctx.db)
        .await?
    else {
        return Ok(());
    };

    attachment::Entity::delete_by_id(attachment_id)
        .exec(&ctx.db)
        .await?;

    if is_orphaned(ctx, existing.blob_id).await? {
        blobs::purge_later(ctx, existing.blob_id).await?;
    }
    Ok(())
}

/// All attachments for an owner, ordered by name then position.
pub async fn list(ctx: &Context, owner: &OwnerRef) -> Result<Vec<attachment::Model>, CoreError> {
    Ok(attachment::Entity::find()
        .filter(attachment::Column::OwnerKind.eq(&owner.kind))
        .filter(attachment::Column::OwnerId.eq(&owner.id))
        .order_by_asc(attachment::Column::Name)
        .order_by_asc(attachment::Column::Position)
        .all(&ctx.db)
        .await?)
}

/// Fetch an attachment together with its blob.
pub async fn find_with_blob(
    ctx: &Context,
    attachment_id: Uuid,
) -> Result<(attachment::Model, blob::Model), CoreError> {
    let attachment = attachment::Entity::find_by_id(attachment_id)
        .one(&ctx.db)
        .await?
        .ok_or_else(|| CoreError::NotFound(attachment_id.to_string()))?;
    let blob = blobs::find(ctx, attachment.blob_id).await?;
    Ok((attachment, blob))
}

async fn is_orphaned(ctx: &Context, blob_id: Uuid) -> Result<bool, CoreError> {
    let referencing = attachment::Entity::find()
        .filter(attachment::Column::BlobId.eq(blob_id))
        .one(&ctx.db)
        .await?;
    Ok(referencing.is_none())
}
