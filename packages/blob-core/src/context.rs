use std::collections::HashSet;
use std::sync::Arc;

use sea_orm::DatabaseConnection;

use common::TokenSigner;
use common::jobs::StorageJob;
use common::service::registry::ServiceRegistry;

use crate::error::CoreError;

/// Everything the registry operations need, threaded explicitly through
/// constructors instead of living in process globals. Built once at startup;
/// cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub db: DatabaseConnection,
    pub services: Arc<ServiceRegistry>,
    pub signer: Arc<TokenSigner>,
    /// Absent when background jobs are disabled; deferred operations then
    /// run inline.
    pub mq: Option<Arc<mq::Mq>>,
    /// Queue name for storage jobs.
    pub job_queue: String,
    /// Owner kinds attachments may reference.
    pub owner_kinds: Arc<HashSet<String>>,
    /// Upper bound on accepted blob sizes.
    pub max_blob_size: u64,
    /// Lifetime of signed read URLs, in seconds.
    pub url_expiry_secs: u64,
}

impl Context {
    /// Enqueue a job, or run nothing and hand the job back for inline
    /// execution when the queue is disabled.
    pub async fn enqueue(&self, job: &StorageJob) -> Result<bool, CoreError> {
        match &self.mq {
            Some(mq) => {
                mq::publish_job(mq, &self.job_queue, job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
