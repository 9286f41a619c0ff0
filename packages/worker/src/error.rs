use blob_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("invalid job payload: {0}")]
    Payload(String),
}

impl WorkerError {
    /// Whether another attempt could plausibly succeed. Permanent failures
    /// go straight to the DLQ; backing off on them only delays the operator.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Core(e) => e.is_transient(),
            Self::Payload(_) => false,
        }
    }
}
