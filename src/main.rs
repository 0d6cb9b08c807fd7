use std::net::SocketAddr;

use anyhow::Context;
use building_asset_api::{app, config::AppConfig, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    tracing::info!("Starting Building Asset API in {:?} mode", config.environment);

    let bind_addr = config.bind_address();
    let state = AppState::connect(config).await?;

    if state.config.bootstrap.seed_on_start {
        let report = state.bootstrap().seed().await.context("seeding default data")?;
        if !report.is_noop() {
            tracing::info!(?report, "seeded default data");
        }
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    Ok(())
}
