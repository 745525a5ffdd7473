use crate::error::PulseError;
use chrono::TimeDelta;
use derive_more::Display;
use std::{path::PathBuf, str::FromStr};

/// Default aggregation bucket width (1 minute).
pub const DEFAULT_BUCKET_SECS: i64 = 60;

/// Default trailing window used for `price_volatility`.
pub const DEFAULT_VOLATILITY_WINDOW: usize = 5;

/// Default rolling-mean window used for the growth-momentum series.
pub const DEFAULT_MOMENTUM_WINDOW: usize = 3;

/// Default name of the numeric interest column in demand records.
pub const DEFAULT_DEMAND_COLUMN: &str = "search_interest";

/// Encoding of the processed series files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum StoreFormat {
    /// Flat `<name>.csv` tables, readable by the dashboard.
    #[default]
    #[display("csv")]
    Csv,
    /// `<name>.jsonl`, one JSON object per line.
    #[display("jsonl")]
    JsonLines,
}

impl FromStr for StoreFormat {
    type Err = PulseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "json_lines" => Ok(Self::JsonLines),
            other => Err(PulseError::InvalidConfig(format!("unknown store format: {other}"))),
        }
    }
}

/// Pipeline configuration.
///
/// Every field can be overridden through a `PULSE_*` environment variable, see
/// [`PipelineConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub store_format: StoreFormat,
    pub trades_prefix: String,
    pub demand_prefix: String,
    /// Explicit trade snapshot, bypasses the directory scan.
    pub trades_file: Option<PathBuf>,
    /// Explicit demand snapshot, bypasses the directory scan.
    pub demand_file: Option<PathBuf>,
    pub bucket_secs: i64,
    pub volatility_window: usize,
    pub momentum_window: usize,
    pub demand_column: String,
    /// Maximum age of a demand point for the asof join. `None` means unbounded backward fill.
    pub demand_staleness_secs: Option<i64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            store_format: StoreFormat::default(),
            trades_prefix: "binance_trades".to_string(),
            demand_prefix: "google_trends".to_string(),
            trades_file: None,
            demand_file: None,
            bucket_secs: DEFAULT_BUCKET_SECS,
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
            momentum_window: DEFAULT_MOMENTUM_WINDOW,
            demand_column: DEFAULT_DEMAND_COLUMN.to_string(),
            demand_staleness_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `PULSE_*` environment variables, falling back to
    /// [`PipelineConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self, PulseError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PulseError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            raw_dir: var("PULSE_RAW_DIR").map(PathBuf::from).unwrap_or(defaults.raw_dir),
            processed_dir: var("PULSE_PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            store_format: parse_var(var("PULSE_STORE_FORMAT"), "PULSE_STORE_FORMAT")?
                .unwrap_or(defaults.store_format),
            trades_prefix: var("PULSE_TRADES_PREFIX").unwrap_or(defaults.trades_prefix),
            demand_prefix: var("PULSE_DEMAND_PREFIX").unwrap_or(defaults.demand_prefix),
            trades_file: var("PULSE_TRADES_FILE").map(PathBuf::from),
            demand_file: var("PULSE_DEMAND_FILE").map(PathBuf::from),
            bucket_secs: parse_var(var("PULSE_BUCKET_SECS"), "PULSE_BUCKET_SECS")?
                .unwrap_or(defaults.bucket_secs),
            volatility_window: parse_var(var("PULSE_VOLATILITY_WINDOW"), "PULSE_VOLATILITY_WINDOW")?
                .unwrap_or(defaults.volatility_window),
            momentum_window: parse_var(var("PULSE_MOMENTUM_WINDOW"), "PULSE_MOMENTUM_WINDOW")?
                .unwrap_or(defaults.momentum_window),
            demand_column: var("PULSE_DEMAND_COLUMN").unwrap_or(defaults.demand_column),
            demand_staleness_secs: parse_var(
                var("PULSE_DEMAND_STALENESS_SECS"),
                "PULSE_DEMAND_STALENESS_SECS",
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PulseError> {
        if self.bucket_secs <= 0 {
            return Err(PulseError::InvalidConfig(format!(
                "bucket_secs must be > 0, got {}",
                self.bucket_secs
            )));
        }
        if self.volatility_window < 2 {
            return Err(PulseError::InvalidConfig(format!(
                "volatility_window must be >= 2, got {}",
                self.volatility_window
            )));
        }
        if self.momentum_window < 1 {
            return Err(PulseError::InvalidConfig(
                "momentum_window must be >= 1".to_string(),
            ));
        }
        if let Some(secs) = self.demand_staleness_secs.filter(|secs| *secs < 0) {
            return Err(PulseError::InvalidConfig(format!(
                "demand_staleness_secs must be >= 0, got {secs}"
            )));
        }
        Ok(())
    }

    pub fn bucket_width(&self) -> TimeDelta {
        TimeDelta::seconds(self.bucket_secs)
    }

    pub fn demand_staleness(&self) -> Option<TimeDelta> {
        self.demand_staleness_secs.map(TimeDelta::seconds)
    }
}

fn parse_var<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
) -> Result<Option<T>, PulseError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| PulseError::InvalidConfig(format!("{key}={raw} is not a valid value")))
        })
        .transpose()
}
