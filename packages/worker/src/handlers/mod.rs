pub mod mirror;
pub mod purge;
pub mod transform;

use blob_core::{Context, VariantEngine};
use common::jobs::StorageJob;

use crate::error::WorkerError;

/// Dispatch one storage job. Every handler is idempotent; redelivery of an
/// already-completed job must succeed.
pub async fn handle_job(
    ctx: &Context,
    engine: &VariantEngine,
    job: &StorageJob,
) -> Result<(), WorkerError> {
    match job {
        StorageJob::PurgeBlob { blob_id } => purge::handle(ctx, *blob_id).await,
        StorageJob::ReplicateBlob {
            service,
            key,
            content_type,
        } => mirror::handle(ctx, service, key, content_type).await,
        StorageJob::TransformVariant {
            blob_id,
            transformation,
        } => transform::handle(ctx, engine, *blob_id, transformation).await,
    }
}
