//! Configuration loading and resolution
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority; clap also maps `RECON_CONFIG`)
//! 2. `~/.config/recon/recon.toml` (platform config dir)
//! 3. `/etc/recon/recon.toml`
//! 4. Compiled defaults (no file)
//!
//! After the file is read, `RECON_LATTICE_URL`, `RECON_BEARER_TOKEN` and
//! `RECON_SANDBOX_TOKEN` override the corresponding keys.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_LATTICE_URL: &str = "RECON_LATTICE_URL";
pub const ENV_BEARER_TOKEN: &str = "RECON_BEARER_TOKEN";
pub const ENV_SANDBOX_TOKEN: &str = "RECON_SANDBOX_TOKEN";

/// Which tracks the ingestor admits into the track cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackFilter {
    /// Every disposition except friendly
    #[default]
    NonFriendly,
    /// Only tracks already marked suspicious or hostile
    SuspiciousOrHostile,
}

/// Root of the TOML config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Lattice environment URL; a bare host gets `https://` prefixed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lattice_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Sent as `anduril-sandbox-authorization` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_token: Option<String>,

    #[serde(default)]
    pub arbiter: ArbiterConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Only read by the simulator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Capacity of each entity cache and each ledger cache
    pub cache_capacity: usize,
    /// Seconds between arbitration cycles
    pub cycle_period_secs: u64,
    /// Dispatch radius in meters
    pub proximity_threshold_meters: f64,
    pub track_filter: TrackFilter,
    /// Service name used as task author
    pub integration_name: String,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 150,
            cycle_period_secs: 1,
            // five statute miles
            proximity_threshold_meters: 8046.72,
            track_filter: TrackFilter::NonFriendly,
            integration_name: "auto-reconnaissance".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Pause between successful long polls
    pub poll_interval_ms: u64,
    /// Pause after a failed long poll
    pub error_backoff_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            error_backoff_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:5750".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub entity_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub refresh_interval_secs: u64,
    pub expiry_offset_secs: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            entity_id: None,
            latitude: 0.0,
            longitude: 0.0,
            refresh_interval_secs: 5,
            expiry_offset_secs: 15,
        }
    }
}

/// Validated connection settings for the Lattice REST API
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeEndpoint {
    /// Scheme + host, no trailing slash, no `/api/v1`
    pub base_url: String,
    pub bearer_token: String,
    pub sandbox_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl LatticeEndpoint {
    /// `{base_url}/api/v1`
    pub fn api_root(&self) -> String {
        format!("{}/api/v1", self.base_url)
    }
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply environment overrides for endpoint and credentials
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_blank_env(ENV_LATTICE_URL) {
            self.lattice_url = Some(url);
        }
        if let Some(token) = non_blank_env(ENV_BEARER_TOKEN) {
            self.bearer_token = Some(token);
        }
        if let Some(token) = non_blank_env(ENV_SANDBOX_TOKEN) {
            self.sandbox_token = Some(token);
        }
    }

    /// Reject configs the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if !has_value(&self.lattice_url) {
            return Err(Error::Config("missing lattice_url".to_string()));
        }
        if !has_value(&self.bearer_token) {
            return Err(Error::Config("missing bearer_token".to_string()));
        }
        if self.arbiter.cache_capacity == 0 {
            return Err(Error::Config("arbiter.cache_capacity must be > 0".to_string()));
        }
        if self.arbiter.cycle_period_secs == 0 {
            return Err(Error::Config("arbiter.cycle_period_secs must be > 0".to_string()));
        }
        let threshold = self.arbiter.proximity_threshold_meters;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::Config(format!(
                "arbiter.proximity_threshold_meters must be a positive distance, got {}",
                threshold
            )));
        }
        if self.ingest.error_backoff_secs == 0 {
            return Err(Error::Config("ingest.error_backoff_secs must be > 0".to_string()));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(Error::Config("http.request_timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Endpoint settings; fails if credentials are missing
    pub fn lattice_endpoint(&self) -> Result<LatticeEndpoint> {
        let url = self
            .lattice_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("missing lattice_url".to_string()))?;
        let bearer_token = self
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("missing bearer_token".to_string()))?;

        Ok(LatticeEndpoint {
            base_url: normalize_base_url(url),
            bearer_token: bearer_token.to_string(),
            sandbox_token: self
                .sandbox_token
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            request_timeout_secs: self.http.request_timeout_secs,
        })
    }
}

/// A validated config and the file it was read from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// `None` when no file was found and only defaults and environment apply
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Log where the config came from; call once tracing is installed
    pub fn log_source(&self) {
        match &self.path {
            Some(path) => info!("Loaded config from {}", path.display()),
            None => warn!("No config file found, using defaults and environment"),
        }
    }
}

/// Resolve, read, override and validate the config
pub fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = resolve_config_path(cli_path);
    let mut config = match &path {
        Some(path) => TomlConfig::from_file(path)?,
        None => TomlConfig::default(),
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(LoadedConfig { config, path })
}

/// Pick the config file path.
///
/// An explicit path is returned even if it does not exist, so the caller
/// reports the missing file instead of silently falling back.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    let user_config = dirs::config_dir().map(|d| d.join("recon").join("recon.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/recon/recon.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Prefix `https://` onto bare hosts and drop trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
