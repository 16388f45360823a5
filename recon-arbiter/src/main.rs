//! recon-arbiter - automatic reconnaissance tasking service
//!
//! Watches the Lattice entity stream for friendly assets and non-friendly
//! tracks, flags tracks that come within range of an asset as suspicious,
//! and tasks the asset to investigate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use recon_common::client::{EntityClient, LatticeHttp, TaskClient};
use recon_common::config::load_config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use recon_arbiter::cache::EntityCache;
use recon_arbiter::engine::{ArbitrationEngine, EngineConfig};
use recon_arbiter::ingest::{EntityIngestor, IngestConfig};
use recon_arbiter::ledger::TaskLedger;
use recon_arbiter::services::LatticeTasker;
use recon_arbiter::{build_router, AppState};

/// Command-line arguments for recon-arbiter
#[derive(Parser, Debug)]
#[command(name = "recon-arbiter")]
#[command(about = "Dispatches friendly assets to investigate nearby tracks")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "RECON_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = &loaded.config;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "recon_arbiter={0},recon_common={0}",
            config.logging.level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting recon-arbiter v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    loaded.log_source();

    let endpoint = config.lattice_endpoint()?;
    info!("Lattice endpoint: {}", endpoint.base_url);
    let http = LatticeHttp::new(&endpoint).context("Failed to build Lattice HTTP client")?;
    let entity_client = Arc::new(EntityClient::new(http.clone()));
    let tasker = Arc::new(LatticeTasker::new(
        TaskClient::new(http),
        config.arbiter.integration_name.clone(),
    ));

    let capacity = config.arbiter.cache_capacity;
    let assets = Arc::new(EntityCache::new(capacity));
    let tracks = Arc::new(EntityCache::new(capacity));
    let ledger = Arc::new(TaskLedger::new(capacity));

    let ingestor = Arc::new(EntityIngestor::new(
        entity_client.clone(),
        Arc::clone(&assets),
        Arc::clone(&tracks),
        IngestConfig::from_config(config),
    ));
    let engine = Arc::new(ArbitrationEngine::new(
        Arc::clone(&assets),
        Arc::clone(&tracks),
        Arc::clone(&ledger),
        entity_client,
        tasker,
        EngineConfig::from_config(config),
    ));

    let cancel = CancellationToken::new();

    let ingest_task = tokio::spawn({
        let ingestor = Arc::clone(&ingestor);
        let cancel = cancel.clone();
        async move { ingestor.run(cancel).await }
    });
    let engine_task = tokio::spawn({
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    let status_task = if config.status.enabled {
        let state = AppState::new(assets, tracks, ledger, engine.stats(), ingestor.stats());
        let app = build_router(state);
        let listener = tokio::net::TcpListener::bind(config.status.bind.as_str())
            .await
            .with_context(|| format!("Failed to bind status API to {}", config.status.bind))?;
        info!("Status API listening on http://{}", config.status.bind);

        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                error!("Status API server error: {}", e);
            }
        }))
    } else {
        info!("Status API disabled by configuration");
        None
    };

    shutdown_signal().await;
    cancel.cancel();

    if let Err(e) = ingest_task.await {
        error!("Ingest task ended abnormally: {}", e);
    }
    if let Err(e) = engine_task.await {
        error!("Arbitration task ended abnormally: {}", e);
    }
    if let Some(task) = status_task {
        if let Err(e) = task.await {
            error!("Status API task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
