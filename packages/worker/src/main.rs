mod config;
mod error;
mod handlers;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use blob_core::{Context, VariantEngine};
use common::TokenSigner;
use common::config::DlqConfig;
use common::dlq::{DlqEnvelope, DlqErrorCode};
use common::jobs::StorageJob;
use common::retry::{RetryDecision, RetryTracker, calculate_backoff, spawn_retry_sweeper};
use common::service::registry::ServiceRegistry;
use mq::{BroccoliError, BrokerMessage, init_mq};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = config::WorkerAppConfig::load().context("Failed to load config")?;

    let db = blob_core::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let signer = Arc::new(TokenSigner::new(config.auth.token_secret.as_bytes()));
    let services = Arc::new(
        ServiceRegistry::from_config(&config.storage, Arc::clone(&signer), &config.public_base)
            .await
            .context("Failed to build storage services")?,
    );

    let mq = Arc::new(
        init_mq(&config.queue)
            .await
            .context("Failed to initialize MQ")?,
    );

    info!(
        queue_name = %config.queue.queue_name,
        dlq_queue_name = %config.queue.dlq_queue_name,
        max_retries = config.queue.dlq.max_retries,
        concurrency = config.worker.concurrency,
        "MQ connected"
    );

    let ctx = Context {
        db,
        services,
        signer,
        mq: Some(Arc::clone(&mq)),
        job_queue: config.queue.queue_name.clone(),
        owner_kinds: Arc::new(HashSet::new()),
        max_blob_size: config.storage.max_blob_size,
        url_expiry_secs: config.storage.url_expiry_secs,
    };
    let engine = Arc::new(VariantEngine::new());

    let dlq_queue = config.queue.dlq_queue_name.clone();
    let dlq_config = config.queue.dlq.clone();
    let mq_for_handler = Arc::clone(&mq);

    let retry_tracker = Arc::new(Mutex::new(RetryTracker::new(dlq_config.max_retries)));

    let _sweeper_handle = spawn_retry_sweeper(
        Arc::clone(&retry_tracker),
        Duration::from_secs(dlq_config.retry_cleanup_interval_secs),
        Duration::from_secs(dlq_config.retry_max_age_secs),
    );

    let result = mq
        .process_messages(
            &config.queue.queue_name,
            Some(config.worker.concurrency),
            None,
            move |message: BrokerMessage<serde_json::Value>| {
                let ctx = ctx.clone();
                let engine = Arc::clone(&engine);
                let mq = Arc::clone(&mq_for_handler);
                let dlq_queue = dlq_queue.clone();
                let dlq_config = dlq_config.clone();
                let retry_tracker = Arc::clone(&retry_tracker);
                async move {
                    process_message(
                        message,
                        &ctx,
                        &engine,
                        &mq,
                        &dlq_queue,
                        &dlq_config,
                        &retry_tracker,
                    )
                    .await
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Worker stopped unexpectedly");
    }

    Ok(())
}

async fn process_message(
    message: BrokerMessage<serde_json::Value>,
    ctx: &Context,
    engine: &VariantEngine,
    mq: &Arc<mq::Mq>,
    dlq_queue: &str,
    dlq_config: &DlqConfig,
    retry_tracker: &Arc<Mutex<RetryTracker>>,
) -> Result<(), BroccoliError> {
    let payload = message.payload;

    let job: StorageJob = match serde_json::from_value(payload.clone()) {
        Ok(job) => job,
        Err(e) => {
            error!(task_id = %message.task_id, error = %e, "Failed to parse storage job");

            let envelope = DlqEnvelope {
                job_id: message.task_id.to_string(),
                job_kind: "unknown".into(),
                payload,
                error_code: DlqErrorCode::DeserializationError,
                error_message: format!("Failed to parse storage job: {e}"),
                retry_history: vec![],
            };
            if let Err(pub_err) = mq.publish(dlq_queue, None, &envelope, None).await {
                error!(error = %pub_err, "Failed to publish to DLQ");
            }

            return Ok(());
        }
    };

    let job_id = job.job_id();
    info!(job_id = %job_id, kind = job.kind(), "Processing storage job");

    loop {
        match handlers::handle_job(ctx, engine, &job).await {
            Ok(()) => {
                retry_tracker.lock().await.clear(&job_id);
                return Ok(());
            }
            // Retrying can only help when the failure is transient; corrupt
            // payloads and unrepresentable blobs dead-letter immediately.
            Err(e) if !e.is_transient() => {
                error!(job_id = %job_id, error = %e, "Permanent failure, sending to DLQ");

                let envelope = DlqEnvelope {
                    job_id: job_id.clone(),
                    job_kind: job.kind().into(),
                    payload: serde_json::to_value(&job).unwrap_or_default(),
                    error_code: DlqErrorCode::PermanentFailure,
                    error_message: e.to_string(),
                    retry_history: vec![],
                };
                if let Err(pub_err) = mq.publish(dlq_queue, None, &envelope, None).await {
                    error!(error = %pub_err, "Failed to publish to DLQ queue");
                    return Err(BroccoliError::Publish(format!(
                        "Failed to publish to DLQ: {pub_err}"
                    )));
                }

                return Ok(());
            }
            Err(e) => {
                let error_str = e.to_string();
                let decision = retry_tracker
                    .lock()
                    .await
                    .record_failure(&job_id, &error_str);

                match decision {
                    RetryDecision::Retry { attempt } => {
                        let delay = calculate_backoff(
                            attempt,
                            dlq_config.base_delay_ms,
                            dlq_config.max_delay_ms,
                        );
                        warn!(
                            job_id = %job_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying storage job"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted { history } => {
                        error!(
                            job_id = %job_id,
                            retry_count = history.len(),
                            error = %e,
                            "Max retries exhausted, sending to DLQ"
                        );

                        let envelope = DlqEnvelope {
                            job_id: job_id.clone(),
                            job_kind: job.kind().into(),
                            payload: serde_json::to_value(&job).unwrap_or_default(),
                            error_code: DlqErrorCode::MaxRetriesExceeded,
                            error_message: error_str,
                            retry_history: history,
                        };
                        if let Err(pub_err) = mq.publish(dlq_queue, None, &envelope, None).await {
                            error!(error = %pub_err, "Failed to publish to DLQ queue");
                            return Err(BroccoliError::Publish(format!(
                                "Failed to publish to DLQ: {pub_err}"
                            )));
                        }

                        return Ok(());
                    }
                }
            }
        }
    }
}
