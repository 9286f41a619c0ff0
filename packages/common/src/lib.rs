pub mod checksum;
pub mod config;
pub mod dlq;
pub mod jobs;
pub mod key;
pub mod retry;
pub mod service;
pub mod signed;

pub use checksum::Checksum;
pub use config::{MqAppConfig, ServiceConfig, StorageConfig};
pub use dlq::{DlqEnvelope, DlqErrorCode};
pub use jobs::{StorageJob, JOB_QUEUE, JOB_DLQ_QUEUE};
pub use service::{BlobService, BoxReader, DirectUpload, Disposition, ServiceError};
pub use signed::{TokenPurpose, TokenSigner};
