//! Settings and publish loop shared by the simulated asset and track

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use recon_common::client::EntityClient;
use recon_common::config::TomlConfig;
use recon_common::lattice::WireEntity;
use recon_common::Position;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Provenance integration name on simulated entities
pub const INTEGRATION_NAME: &str = "recon-sim";

/// Resolved settings for one simulated entity
#[derive(Debug, Clone, PartialEq)]
pub struct SimSettings {
    pub entity_id: String,
    pub position: Position,
    pub refresh_interval: Duration,
    pub expiry_offset: chrono::Duration,
}

/// Command-line values that take precedence over the `[simulation]` section
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SimArgs {
    /// Entity id to publish under
    #[arg(long)]
    pub entity_id: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
}

impl SimSettings {
    /// Merge command line over config over defaults
    pub fn resolve(config: &TomlConfig, args: &SimArgs, default_id: &str) -> Result<Self> {
        let sim = config.simulation.clone().unwrap_or_default();

        let entity_id = args
            .entity_id
            .clone()
            .or(sim.entity_id)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| default_id.to_string());

        let position = Position {
            latitude_degrees: args.latitude.unwrap_or(sim.latitude),
            longitude_degrees: args.longitude.unwrap_or(sim.longitude),
            altitude_hae_meters: None,
        };
        if !position.is_valid() {
            bail!(
                "simulated position ({}, {}) is out of range",
                position.latitude_degrees,
                position.longitude_degrees
            );
        }
        if sim.refresh_interval_secs == 0 {
            bail!("simulation.refresh_interval_secs must be > 0");
        }

        Ok(Self {
            entity_id,
            position,
            refresh_interval: Duration::from_secs(sim.refresh_interval_secs),
            expiry_offset: chrono::Duration::seconds(sim.expiry_offset_secs),
        })
    }

    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.expiry_offset
    }
}

/// Publish `generate(now)` every `refresh_interval` until cancelled.
///
/// Publish failures are logged and retried on the next tick.
pub async fn publish_loop<F>(
    client: &EntityClient,
    settings: &SimSettings,
    cancel: &CancellationToken,
    generate: F,
) where
    F: Fn(DateTime<Utc>) -> WireEntity,
{
    info!(entity_id = %settings.entity_id, "Starting publish loop (every {:?})", settings.refresh_interval);

    let mut timer = interval(settings.refresh_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }

        let entity = generate(Utc::now());
        match client.publish_entity(&entity).await {
            Ok(()) => debug!(entity_id = %settings.entity_id, "Published entity"),
            Err(e) => error!(entity_id = %settings.entity_id, "Publish failed: {}", e),
        }
    }

    info!(entity_id = %settings.entity_id, "Publish loop stopped");
}
