use std::path::{Path, PathBuf};

use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./monitoring.db")
}

/// Tuning of the ingestion pipeline
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct MonitoringConfig {
    /// Indications older than this are deleted by the retention sweep
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,

    /// How far back the forecaster looks for history
    #[serde(default = "default_forecast_horizon_hours")]
    pub forecast_horizon_hours: u32,

    /// How many average-delta steps the forecast extrapolates
    #[serde(default = "default_forecast_steps")]
    pub forecast_steps: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            forecast_horizon_hours: default_forecast_horizon_hours(),
            forecast_steps: default_forecast_steps(),
        }
    }
}

/// Upper bound for `retention_hours` and `forecast_horizon_hours` (100 years)
pub const MAX_WINDOW_HOURS: u32 = 24 * 365 * 100;

impl MonitoringConfig {
    /// Reject windows that cannot be subtracted from a timestamp
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, hours) in [
            ("retention_hours", self.retention_hours),
            ("forecast_horizon_hours", self.forecast_horizon_hours),
        ] {
            if hours > MAX_WINDOW_HOURS {
                anyhow::bail!("{name} = {hours} exceeds the maximum of {MAX_WINDOW_HOURS}");
            }
        }
        Ok(())
    }
}

fn default_retention_hours() -> u32 {
    24
}

fn default_forecast_horizon_hours() -> u32 {
    3
}

fn default_forecast_steps() -> u32 {
    60
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (defaults to SQLite)
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

/// Read the config file, falling back to defaults if it does not exist
pub fn read_config_or_default(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        trace!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    read_config_file(path)
}

fn parse_config(content: &str) -> anyhow::Result<Config> {
    let config: Config = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.monitoring.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
