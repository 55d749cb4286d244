use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use wx_core::config::LoggingConfig;
use wx_core::{AppConfig, FileStore, LatestReading, MemoryStore, ReadingStore, StorageConfig};
use wx_server::{Ingestor, PublisherRegistry};
use wx_web::{create_router, ingest_router, ServerState};

/// Weather station collector: ingests device uploads, serves the query API
/// and republishes readings to external services.
#[derive(Debug, Parser)]
#[command(name = "wx-station", version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config/wx-station.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    init_logging(&config.logging);

    tracing::info!("Weather station starting...");

    let store = open_store(&config.storage)?;
    let cache = Arc::new(LatestReading::new());

    let device_type = &config.collector.device.device_type;
    let ingestor = Ingestor::new(device_type.as_str(), cache, store.clone());
    if ingestor.device().is_none() {
        tracing::warn!(
            "Unsupported device type '{}': uploads will be acknowledged but ignored",
            device_type
        );
    }

    let registry = PublisherRegistry::from_configs(config.publisher_configs(), store.clone())?;

    let state = Arc::new(ServerState::new(
        ingestor,
        config.station.clone(),
        registry.stats(),
    ));

    let ingest_addr = config.collector.device.socket_addr(&config.server.address)?;
    let api_addr = config.server.socket_addr()?;

    let ingest_listener = TcpListener::bind(ingest_addr)
        .await
        .with_context(|| format!("failed to bind ingestion endpoint on {ingest_addr}"))?;
    let api_listener = TcpListener::bind(api_addr)
        .await
        .with_context(|| format!("failed to bind API server on {api_addr}"))?;

    let ingest_app = ingest_router(state.clone());
    let ingest_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(ingest_listener, ingest_app).await {
            tracing::error!("Ingestion server error: {}", e);
        }
    });

    let api_app = create_router(state);
    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(api_listener, api_app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    let started = registry.start_all().await;

    tracing::info!("Weather station ready");
    tracing::info!("   Ingestion: http://{}/", ingest_addr);
    tracing::info!("   API:       http://{}/api/current", api_addr);
    tracing::info!("   Publishers running: {}", started);

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal, shutting down...");
        }
        _ = ingest_handle => {
            tracing::warn!("Ingestion server stopped");
        }
        _ = api_handle => {
            tracing::warn!("API server stopped");
        }
    }

    registry.stop_all().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ReadingStore>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageConfig::File { path } => {
            let store = FileStore::open(path)
                .with_context(|| format!("failed to open store {}", path.display()))?;
            if store.skipped_lines() > 0 {
                tracing::warn!(
                    "Skipped {} unreadable lines in {}",
                    store.skipped_lines(),
                    path.display()
                );
            }
            tracing::info!("Loaded {} readings from {}", store.len(), path.display());
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
