mod config;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context as _, bail};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::Level;

use blob_core::Context;
use blob_core::entity::{blob, variant_record};
use common::TokenSigner;
use common::jobs::StorageJob;
use common::service::registry::ServiceRegistry;

#[derive(Parser)]
#[command(
    name = "pantry",
    about = "Maintenance tooling for the Pantry storage service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Purge blobs that were never attached to an owner
    PurgeUnattached {
        /// Only purge blobs older than this many days
        #[arg(long, default_value_t = 2)]
        older_than_days: u32,
        /// Report what would be purged without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Report mirror secondaries missing objects, optionally repairing
    MirrorVerify {
        /// Name of the mirror service to verify
        #[arg(long)]
        service: String,
        /// Replicate missing objects from the primary
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::WARN).init();

    let cli = Cli::parse();
    let config = config::CliAppConfig::load().context("Failed to load config")?;

    let db = blob_core::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    let signer = Arc::new(TokenSigner::new(config.auth.token_secret.as_bytes()));
    let services = Arc::new(
        ServiceRegistry::from_config(&config.storage, Arc::clone(&signer), &config.public_base)
            .await
            .context("Failed to build storage services")?,
    );

    let mq = if config.queue.enabled {
        Some(Arc::new(
            mq::init_mq(&config.queue)
                .await
                .context("Failed to initialize MQ")?,
        ))
    } else {
        None
    };

    let ctx = Context {
        db,
        services,
        signer,
        mq,
        job_queue: config.queue.queue_name.clone(),
        owner_kinds: Arc::new(HashSet::new()),
        max_blob_size: config.storage.max_blob_size,
        url_expiry_secs: config.storage.url_expiry_secs,
    };

    match cli.command {
        Command::PurgeUnattached {
            older_than_days,
            dry_run,
        } => purge_unattached(&ctx, older_than_days, dry_run).await,
        Command::MirrorVerify { service, repair } => mirror_verify(&ctx, &service, repair).await,
    }
}

async fn purge_unattached(ctx: &Context, older_than_days: u32, dry_run: bool) -> anyhow::Result<()> {
    let cutoff = Utc::now() - ChronoDuration::days(i64::from(older_than_days));

    let purged = blob_core::blobs::purge_unattached(ctx, cutoff, dry_run).await?;

    let verb = if dry_run { "would purge" } else { "purged" };
    for blob in &purged {
        println!(
            "{verb} {id} key={key} size={size} created={created}",
            id = blob.id,
            key = blob.key,
            size = blob.byte_size,
            created = blob.created_at.to_rfc3339(),
        );
    }
    println!("{verb} {} unattached blob(s) older than {cutoff}", purged.len());
    Ok(())
}

async fn mirror_verify(ctx: &Context, service: &str, repair: bool) -> anyhow::Result<()> {
    let Some(mirror) = ctx.services.mirror(service) else {
        bail!("'{service}' is not a configured mirror service");
    };

    let blobs = blob::Entity::find()
        .filter(blob::Column::ServiceName.eq(service))
        .all(&ctx.db)
        .await?;

    let mut scanned = 0usize;
    let mut gaps = 0usize;

    for blob in &blobs {
        // Derived artifacts mirror with their source blob.
        let mut keys = vec![(blob.key.clone(), blob.content_type.clone())];
        let variants = variant_record::Entity::find()
            .filter(variant_record::Column::BlobId.eq(blob.id))
            .all(&ctx.db)
            .await?;
        keys.extend(
            variants
                .into_iter()
                .map(|v| (v.key, v.content_type)),
        );

        for (key, content_type) in keys {
            scanned += 1;
            let missing = mirror.missing_on(&key).await;
            if missing.is_empty() {
                continue;
            }
            gaps += 1;
            println!("{key} missing on: {}", missing.join(", "));

            if repair {
                let enqueued = ctx
                    .enqueue(&StorageJob::ReplicateBlob {
                        service: service.to_string(),
                        key: key.clone(),
                        content_type: content_type.clone(),
                    })
                    .await?;
                if enqueued {
                    println!("  -> replication enqueued");
                } else {
                    mirror.replicate(&key, &content_type).await?;
                    println!("  -> replicated from primary");
                }
            }
        }
    }

    println!("scanned {scanned} object(s) across {} blob(s), {gaps} with gaps", blobs.len());
    Ok(())
}
