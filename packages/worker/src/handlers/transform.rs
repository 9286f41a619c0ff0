use tracing::{info, warn};
use uuid::Uuid;

use blob_core::{Context, CoreError, Transformation, VariantEngine, blobs, representable};

use crate::error::WorkerError;

pub async fn handle(
    ctx: &Context,
    engine: &VariantEngine,
    blob_id: Uuid,
    transformation: &serde_json::Value,
) -> Result<(), WorkerError> {
    let transformation: Transformation = serde_json::from_value(transformation.clone())
        .map_err(|e| WorkerError::Payload(e.to_string()))?;

    let blob = match blobs::find(ctx, blob_id).await {
        Ok(blob) => blob,
        Err(CoreError::NotFound(_)) => {
            // The blob was purged after the job was enqueued.
            warn!(blob_id = %blob_id, "blob gone, skipping variant pre-processing");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if !representable(&blob.content_type) {
        warn!(
            blob_id = %blob_id,
            content_type = %blob.content_type,
            "blob is not representable, skipping variant pre-processing"
        );
        return Ok(());
    }

    let record = engine.variant_for(ctx, &blob, &transformation).await?;
    info!(blob_id = %blob_id, key = %record.key, "variant pre-processing completed");
    Ok(())
}
