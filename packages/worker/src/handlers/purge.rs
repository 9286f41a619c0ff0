use tracing::info;
use uuid::Uuid;

use blob_core::{Context, blobs};

use crate::error::WorkerError;

pub async fn handle(ctx: &Context, blob_id: Uuid) -> Result<(), WorkerError> {
    blobs::purge(ctx, blob_id).await?;
    info!(blob_id = %blob_id, "purge job completed");
    Ok(())
}
