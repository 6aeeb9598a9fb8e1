//! TOML replay configuration.
//!
//! ```toml
//! [backtest]
//! symbols = ["TXFC2", "MXFC2"]
//! initial_capital = 5000000.0
//! start_date = "2021-03-01 08:45:00"
//! data_dir = "data"
//!
//! [strategy]
//! short_window = 20
//! long_window = 30
//!
//! [portfolio]
//! fixed_quantity = 100
//!
//! [execution]
//! venue = "TAIFEX"
//! margin_per_contract = 167000.0
//!
//! [report]
//! hwm_seed = "zero"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use replaylab_core::analytics::ReportOptions;
use replaylab_core::components::MovingAverageCrossConfig;
use replaylab_core::engine::{DriverConfig, ExecutionConfig, FeeRule, FeeSchedule, PortfolioConfig};
use replaylab_core::CoreError;

/// Unique identifier for a replay run (content-addressable hash).
pub type RunId = String;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Complete configuration for one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub strategy: MovingAverageCrossConfig,
    #[serde(default)]
    pub portfolio: PortfolioSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub report: ReportOptions,
}

/// `[backtest]`: universe, capital, timeline and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbols: Vec<String>,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Timestamp of the initial-capital snapshot. Bars before it are dropped.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_date: NaiveDateTime,
    #[serde(default)]
    pub heartbeat_ms: u64,
    #[serde(default)]
    pub max_bars: Option<usize>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Generate synthetic bars for symbols without a CSV file.
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default = "default_synthetic_bars")]
    pub synthetic_bars: usize,
}

/// `[portfolio]`: order sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSection {
    pub fixed_quantity: u64,
}

impl Default for PortfolioSection {
    fn default() -> Self {
        Self {
            fixed_quantity: PortfolioConfig::default().fixed_quantity,
        }
    }
}

/// `[execution]`: venue, margin and optional fee table override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub venue: String,
    pub margin_per_contract: f64,
    /// Replaces the built-in fee rows when present.
    pub fee_rules: Option<Vec<FeeRule>>,
    /// Catch-all row used with `fee_rules`; the built-in default otherwise.
    pub default_fee: Option<FeeRule>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        let base = ExecutionConfig::default();
        Self {
            venue: base.venue,
            margin_per_contract: base.margin_per_contract,
            fee_rules: None,
            default_fee: None,
        }
    }
}

fn default_initial_capital() -> f64 {
    PortfolioConfig::default().initial_capital
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_synthetic_bars() -> usize {
    500
}

/// Accept either a full timestamp or a bare date (midnight).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognized timestamp '{raw}'"))
    })
}

/// Parse the timestamp formats accepted in configs and CSV files.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

impl ReplayConfig {
    /// Read and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let symbols = &self.backtest.symbols;
        if symbols.is_empty() {
            return Err(ConfigError::Invalid("backtest.symbols must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for s in symbols {
            if s.trim().is_empty() {
                return Err(ConfigError::Invalid("symbol names must not be blank".into()));
            }
            if !seen.insert(s.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate symbol '{s}'")));
            }
        }
        if self.backtest.synthetic && self.backtest.synthetic_bars == 0 {
            return Err(ConfigError::Invalid(
                "backtest.synthetic_bars must be >= 1 when synthetic data is enabled".into(),
            ));
        }
        let margin = self.execution.margin_per_contract;
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "execution.margin_per_contract must be non-negative, got {margin}"
            )));
        }
        if self.report.periods == Some(0) {
            return Err(ConfigError::Invalid("report.periods must be >= 1".into()));
        }
        self.strategy.validate()?;
        self.portfolio_config().validate()?;
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        let hash = blake3::hash(json.as_bytes());
        Ok(hash.to_hex().to_string())
    }

    pub fn portfolio_config(&self) -> PortfolioConfig {
        PortfolioConfig {
            initial_capital: self.backtest.initial_capital,
            fixed_quantity: self.portfolio.fixed_quantity,
        }
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        let fee_schedule = match &self.execution.fee_rules {
            Some(rules) => FeeSchedule {
                rules: rules.clone(),
                default: self
                    .execution
                    .default_fee
                    .clone()
                    .unwrap_or_else(|| FeeSchedule::taifex().default),
            },
            None => {
                let mut schedule = FeeSchedule::taifex();
                if let Some(default) = &self.execution.default_fee {
                    schedule.default = default.clone();
                }
                schedule
            }
        };
        ExecutionConfig {
            venue: self.execution.venue.clone(),
            margin_per_contract: self.execution.margin_per_contract,
            fee_schedule,
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            heartbeat_ms: self.backtest.heartbeat_ms,
            max_bars: self.backtest.max_bars,
            report: self.report.clone(),
        }
    }
}
