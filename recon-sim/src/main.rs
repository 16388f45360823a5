//! recon-sim - simulated Lattice entities for exercising recon-arbiter
//!
//! - `asset`: a friendly USV that accepts investigate tasks
//! - `track`: an unknown surface contact
//! - `get-entity`: fetch one entity and print it as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recon_common::client::{EntityClient, LatticeHttp, TaskClient};
use recon_common::config::{load_config, TomlConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod asset;
mod publisher;
mod track;

use asset::SimulatedAsset;
use publisher::{SimArgs, SimSettings};
use track::SimulatedTrack;

/// Command-line arguments for recon-sim
#[derive(Parser, Debug)]
#[command(name = "recon-sim")]
#[command(about = "Simulated assets and tracks for the reconnaissance arbiter")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "RECON_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a friendly asset and answer its tasks
    Asset(SimArgs),

    /// Publish an unknown track
    Track(SimArgs),

    /// Fetch one entity and print it
    GetEntity {
        /// Entity id to fetch
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = &loaded.config;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("recon_sim={0},recon_common={0}", config.logging.level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting recon-sim v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    loaded.log_source();

    let http = connect(config)?;

    match cli.command {
        Command::Asset(args) => {
            let settings = SimSettings::resolve(config, &args, "asset-01")?;
            let asset = SimulatedAsset::new(settings, EntityClient::new(http.clone()), TaskClient::new(http));
            run_until_shutdown(|cancel| async move { asset.run(cancel).await }).await;
        }
        Command::Track(args) => {
            let settings = SimSettings::resolve(config, &args, "track-01")?;
            let track = SimulatedTrack::new(settings, EntityClient::new(http));
            run_until_shutdown(|cancel| async move { track.run(cancel).await }).await;
        }
        Command::GetEntity { id } => {
            let entity = EntityClient::new(http)
                .get_entity(&id)
                .await
                .with_context(|| format!("Failed to fetch entity {}", id))?;
            println!("{}", serde_json::to_string_pretty(&entity)?);
        }
    }

    Ok(())
}

fn connect(config: &TomlConfig) -> Result<LatticeHttp> {
    let endpoint = config.lattice_endpoint()?;
    info!("Lattice endpoint: {}", endpoint.base_url);
    LatticeHttp::new(&endpoint).context("Failed to build Lattice HTTP client")
}

/// Run a simulation until Ctrl+C or SIGTERM, then cancel it and wait
async fn run_until_shutdown<F, Fut>(simulation: F)
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();

    tokio::join!(simulation(cancel), async move {
        shutdown_signal().await;
        stopper.cancel();
    });

    info!("Shutdown complete");
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
