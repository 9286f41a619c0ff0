use serde::{Deserialize, Serialize};

use crate::retry::RetryAttempt;

/// Error codes for dead-lettered storage jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DlqErrorCode {
    /// All retry attempts exhausted.
    MaxRetriesExceeded,
    /// Failed to deserialize the job payload.
    DeserializationError,
    /// The job failed in a way retrying cannot fix.
    PermanentFailure,
}

impl DlqErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            Self::DeserializationError => "DESERIALIZATION_ERROR",
            Self::PermanentFailure => "PERMANENT_FAILURE",
        }
    }
}

impl std::fmt::Display for DlqErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Envelope for transporting failed jobs to the DLQ.
///
/// Carries everything an operator needs to diagnose and replay the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEnvelope {
    /// Stable job identifier (`StorageJob::job_id`).
    pub job_id: String,
    /// Job kind (`purge_blob`, `replicate_blob`, `transform_variant`), or
    /// "unknown" when the payload never deserialized.
    pub job_kind: String,
    /// Full serialized job payload.
    pub payload: serde_json::Value,
    pub error_code: DlqErrorCode,
    pub error_message: String,
    /// One entry per failed attempt, oldest first.
    pub retry_history: Vec<RetryAttempt>,
}
