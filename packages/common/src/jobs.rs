use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue for storage jobs (server/cli publish, worker consumes).
pub const JOB_QUEUE: &str = "pantry_storage_jobs";
/// Queue receiving jobs that exhausted their retries.
pub const JOB_DLQ_QUEUE: &str = "pantry_storage_dlq";

/// A deferred storage operation.
///
/// Delivery is at-least-once, so every job must be idempotent: purging an
/// already-purged blob, replicating an already-replicated key, and
/// re-deriving an existing variant are all no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageJob {
    /// Delete a blob's backend bytes and registry rows.
    PurgeBlob { blob_id: Uuid },
    /// Copy an object from a mirror's primary to any secondary missing it.
    ReplicateBlob {
        service: String,
        key: String,
        content_type: String,
    },
    /// Pre-derive a variant so the first delivery request doesn't pay for
    /// the transform.
    TransformVariant {
        blob_id: Uuid,
        /// Serialized transformation parameters, interpreted by blob-core.
        transformation: serde_json::Value,
    },
}

impl StorageJob {
    /// Stable identifier used for retry tracking and DLQ correlation.
    pub fn job_id(&self) -> String {
        match self {
            Self::PurgeBlob { blob_id } => format!("purge:{blob_id}"),
            Self::ReplicateBlob { service, key, .. } => format!("replicate:{service}:{key}"),
            Self::TransformVariant {
                blob_id,
                transformation,
            } => format!("transform:{blob_id}:{transformation}"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PurgeBlob { .. } => "purge_blob",
            Self::ReplicateBlob { .. } => "replicate_blob",
            Self::TransformVariant { .. } => "transform_variant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_round_trip_through_json() {
        let job = StorageJob::ReplicateBlob {
            service: "mirrored".into(),
            key: "abc123".into(),
            content_type: "image/png".into(),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"replicate_blob\""));
        let parsed: StorageJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.job_id(), job.job_id());
    }

    #[test]
    fn job_ids_are_stable_per_target() {
        let id = Uuid::now_v7();
        let a = StorageJob::PurgeBlob { blob_id: id };
        let b = StorageJob::PurgeBlob { blob_id: id };
        assert_eq!(a.job_id(), b.job_id());
    }
}
