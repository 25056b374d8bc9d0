use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::assets::run_orphan_sweeper;
use server::config::AppConfig;
use server::database::init_db;
use server::state::{AppState, build_blob_store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to initialize database")?;
    info!("Database ready");

    let blob_store = build_blob_store(&config.storage)
        .await
        .context("Failed to initialize object store")?;
    info!(backend = ?config.storage.backend, "Object store ready");

    if config.sweeper.enabled {
        tokio::spawn(run_orphan_sweeper(
            db.clone(),
            blob_store.clone(),
            config.sweeper.clone(),
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;

    let app = server::build_router(AppState::new(config, db, blob_store));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
