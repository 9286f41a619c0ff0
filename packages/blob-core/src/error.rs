use common::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Content type {0} cannot be represented as an image variant")]
    Unrepresentable(String),

    #[error("Variant generation is contended; retry with backoff")]
    Contended,

    /// The transform task died before producing a result (panic or runtime
    /// shutdown), as opposed to rejecting the input. Retryable.
    #[error("Variant processing failed: {0}")]
    Processing(String),

    #[error("Unknown owner kind: {0}")]
    UnknownOwnerKind(String),

    #[error("Unknown storage service: {0}")]
    UnknownService(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Service(#[from] ServiceError),

    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("Queue error: {0}")]
    Queue(String),
}

impl CoreError {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Contended => true,
            Self::Processing(_) => true,
            Self::Service(e) => e.is_transient(),
            Self::Queue(_) => true,
            _ => false,
        }
    }
}

impl From<mq::MqError> for CoreError {
    fn from(err: mq::MqError) -> Self {
        Self::Queue(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_failures_are_transient() {
        assert!(CoreError::Contended.is_transient());
        assert!(CoreError::Processing("task aborted".into()).is_transient());
        assert!(CoreError::Queue("broker gone".into()).is_transient());
        assert!(
            CoreError::Service(ServiceError::Unavailable("backend offline".into())).is_transient()
        );
    }

    #[test]
    fn caller_errors_are_not_transient() {
        assert!(!CoreError::Unrepresentable("application/pdf".into()).is_transient());
        assert!(!CoreError::Validation("bad input".into()).is_transient());
        assert!(!CoreError::NotFound("gone".into()).is_transient());
        assert!(
            !CoreError::Service(ServiceError::ChecksumMismatch {
                expected: "aa".into(),
                actual: "bb".into(),
            })
            .is_transient()
        );
    }
}
