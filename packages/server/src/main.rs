use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing::{Level, info};

use blob_core::{Context, VariantEngine};
use common::TokenSigner;
use common::service::registry::ServiceRegistry;
use server::config::AppConfig;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = blob_core::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let signer = Arc::new(TokenSigner::new(config.auth.token_secret.as_bytes()));
    let services = Arc::new(
        ServiceRegistry::from_config(
            &config.storage,
            Arc::clone(&signer),
            &config.server.public_base,
        )
        .await
        .context("Failed to build storage services")?,
    );

    let mq = if config.queue.enabled {
        let queue = mq::init_mq(&config.queue)
            .await
            .context("Failed to initialize MQ")?;
        info!(queue_name = %config.queue.queue_name, "MQ connected");
        Some(Arc::new(queue))
    } else {
        info!("background jobs disabled; deferred operations run inline");
        None
    };

    let ctx = Context {
        db,
        services,
        signer,
        mq,
        job_queue: config.queue.queue_name.clone(),
        owner_kinds: Arc::new(config.owner_kinds.iter().cloned().collect::<HashSet<_>>()),
        max_blob_size: config.storage.max_blob_size,
        url_expiry_secs: config.storage.url_expiry_secs,
    };

    let cors = cors_layer(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        ctx,
        variants: Arc::new(VariantEngine::new()),
        config: Arc::new(config),
    };

    let app = server::build_router(state).layer(cors);

    info!("Server running at http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origins = config
        .server
        .cors
        .allow_origins
        .iter()
        .map(|o| o.parse::<HeaderValue>().context("Invalid CORS origin"))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .max_age(std::time::Duration::from_secs(config.server.cors.max_age)))
}
