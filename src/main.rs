use anyhow::Context;
use classmgmt::app::{router, AppState};
use classmgmt::config::AppConfig;
use classmgmt::storage::client::{S3StorageClient, StorageClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classmgmt=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing::info!("Starting class management server...");

    // Connect to MongoDB
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.mongodb_database);
    tracing::info!("Connected to MongoDB database '{}'", config.mongodb_database);

    // Connect to S3
    let storage: Arc<dyn StorageClient> = Arc::new(S3StorageClient::from_config(&config).await);
    tracing::info!("S3 storage client initialized for bucket '{}'", config.s3_bucket);

    let state = AppState::from_mongo(&mongo_db, storage, &config)
        .await
        .context("Failed to initialize repositories")?;
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
