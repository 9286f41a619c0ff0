use broccoli_queue::queue::BroccoliQueueBuilder;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage,
    error::BroccoliError,
    queue::{BroccoliQueue, ConsumeOptions},
};
use tracing::debug;

use common::config::MqAppConfig;
use common::jobs::StorageJob;

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;
pub type MqBuilder = BroccoliQueueBuilder;

/// Connect to the broker with the configured pool size.
pub async fn init_mq(config: &MqAppConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)
}

/// Publish a storage job to the job queue.
pub async fn publish_job(
    mq: &MqQueue,
    queue_name: &str,
    job: &StorageJob,
) -> Result<(), MqError> {
    debug!(job_id = %job.job_id(), queue = queue_name, "publishing storage job");
    mq.publish(queue_name, None, job, None).await?;
    Ok(())
}
