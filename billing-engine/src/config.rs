use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use time::UtcOffset;

use crate::transform::units::FuelConversion;

#[derive(Debug, Clone, Deserialize)]
pub struct QuestDbConfig {
    pub uri: String,
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

/// Thresholds and constants of the accounting engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fuel: FuelConversion,
    /// Largest acceptable deviation, in days, between a month's metered span
    /// and its calendar length before the month is charted as unreliable.
    #[serde(default = "default_max_bill_day_err")]
    pub max_bill_day_err: f64,
    /// A day's metered span must fall within `[daily_min_days, daily_max_days]`
    /// for its total to be charted.
    #[serde(default = "default_daily_min_days")]
    pub daily_min_days: f64,
    #[serde(default = "default_daily_max_days")]
    pub daily_max_days: f64,
    /// Offset used to decide which calendar day/month a reading falls in.
    #[serde(default)]
    pub utc_offset_hours: i8,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuel: FuelConversion::default(),
            max_bill_day_err: default_max_bill_day_err(),
            daily_min_days: default_daily_min_days(),
            daily_max_days: default_daily_max_days(),
            utc_offset_hours: 0,
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn offset(&self) -> UtcOffset {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.fuel.energy_content.is_finite() && self.fuel.energy_content > 0.0,
            "engine.fuel.energy_content must be positive"
        );
        anyhow::ensure!(
            self.fuel.efficiency > 0.0 && self.fuel.efficiency <= 1.0,
            "engine.fuel.efficiency must be in (0, 1]"
        );
        anyhow::ensure!(self.max_bill_day_err >= 0.0, "engine.max_bill_day_err must be non-negative");
        anyhow::ensure!(
            self.daily_min_days <= self.daily_max_days,
            "engine.daily_min_days must not exceed engine.daily_max_days"
        );
        anyhow::ensure!(
            UtcOffset::from_hms(self.utc_offset_hours, 0, 0).is_ok(),
            "engine.utc_offset_hours out of range"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDirectoryConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub report_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus text file written at the end of a batch
    /// (node_exporter textfile collector).
    pub textfile_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub questdb: QuestDbConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub fixtures: FixtureConfig,
    pub customers: CustomerDirectoryConfig,
    pub output: OutputConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("BILLING_CONFIG").unwrap_or_else(|_| "billing-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.engine.validate()?;
        Ok(cfg)
    }
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_max_bill_day_err() -> f64 {
    6.0
}

fn default_daily_min_days() -> f64 {
    0.75
}

fn default_daily_max_days() -> f64 {
    1.25
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_workers() -> usize {
    4
}
