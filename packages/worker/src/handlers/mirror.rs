use tracing::{info, warn};

use blob_core::{Context, CoreError};

use crate::error::WorkerError;

pub async fn handle(
    ctx: &Context,
    service: &str,
    key: &str,
    content_type: &str,
) -> Result<(), WorkerError> {
    let Some(mirror) = ctx.services.mirror(service) else {
        // A config change can demote a mirror between enqueue and delivery.
        warn!(service, key, "service is not a mirror, skipping replication");
        return Ok(());
    };

    mirror
        .replicate(key, content_type)
        .await
        .map_err(CoreError::Service)?;
    info!(service, key, "replication job completed");
    Ok(())
}
