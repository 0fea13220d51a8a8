use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use model_registry::api;
use model_registry::config::RegistryConfig;
use model_registry::model_store::build_model_store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // `model-registry <env-file>` reads settings from the file as well as the environment.
    let config = match std::env::args().nth(1) {
        Some(path) => RegistryConfig::from_env_file(std::path::Path::new(&path)),
        None => RegistryConfig::from_env(),
    }
    .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    info!(
        version = %config.version,
        environment = %config.environment,
        source = config.models_repository.source(),
        "starting model registry"
    );

    let store = build_model_store(&config.models_repository)
        .await
        .context("building model store")?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "model registry listening");

    axum::serve(listener, api::router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
