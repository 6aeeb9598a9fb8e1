//! Replay runner: wires config, loaded bars and the core driver together.
//!
//! Two entry points:
//! - `run_replay()`: loads bars from `data_dir` (or synthetic), then runs. Used by the CLI.
//! - `run_replay_on_data()`: takes pre-aligned bars. No I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use replaylab_core::analytics::PerformanceReport;
use replaylab_core::components::MovingAverageCross;
use replaylab_core::data::{HistoricalFeed, MarketDataFeed};
use replaylab_core::domain::Bar;
use replaylab_core::engine::{Backtest, EquityTable, PortfolioLedger, RunStats, SimulatedExecution};
use replaylab_core::CoreError;

use crate::config::{ConfigError, ReplayConfig, RunId};
use crate::data_loader::{load_bars, LoadError, LoadOptions};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest error: {0}")]
    Core(#[from] CoreError),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Run metadata plus the performance report; persisted as `report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: ReplayConfig,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub stats: RunStats,
    pub performance: PerformanceReport,
    pub final_cash: f64,
    pub final_positions: BTreeMap<String, i64>,
    pub trade_fee_cumulative: f64,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete result of one replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayResult {
    pub report: RunReport,
    /// Per-bar holdings joined with returns, equity curve and drawdown.
    pub equity: EquityTable,
}

/// Load bars per the config and run the replay.
pub fn run_replay(config: &ReplayConfig) -> Result<ReplayResult, RunError> {
    config.validate()?;
    let opts = LoadOptions {
        data_dir: config.backtest.data_dir.clone(),
        start: config.backtest.start_date,
        synthetic: config.backtest.synthetic,
        synthetic_bars: config.backtest.synthetic_bars,
    };
    let loaded = load_bars(&config.backtest.symbols, &opts)?;
    run_replay_on_data(config, loaded.series, &loaded.dataset_hash, loaded.has_synthetic)
}

/// Run the replay over pre-aligned bars, one series per configured symbol.
pub fn run_replay_on_data(
    config: &ReplayConfig,
    series: Vec<(String, Vec<Bar>)>,
    dataset_hash: &str,
    has_synthetic: bool,
) -> Result<ReplayResult, RunError> {
    let run_id = config.run_id()?;
    info!(%run_id, %dataset_hash, has_synthetic, "replay starting");

    let feed = HistoricalFeed::new(series)?;
    let universe = feed.universe().clone();
    let strategy = MovingAverageCross::new(&universe, config.strategy.clone())?;
    let ledger = PortfolioLedger::new(
        &universe,
        &config.portfolio_config(),
        config.backtest.start_date,
    )?;
    let execution = SimulatedExecution::new(&universe, &config.execution_config())?;

    let mut backtest = Backtest::new(
        Box::new(feed),
        Box::new(strategy),
        ledger,
        Box::new(execution),
        config.driver_config(),
    )?;
    let outcome = backtest.run()?;

    let final_positions = universe
        .symbols()
        .iter()
        .cloned()
        .zip(outcome.final_positions.iter().copied())
        .collect();

    Ok(ReplayResult {
        report: RunReport {
            schema_version: SCHEMA_VERSION,
            run_id,
            config: config.clone(),
            dataset_hash: dataset_hash.to_string(),
            has_synthetic,
            stats: outcome.stats,
            performance: outcome.report,
            final_cash: outcome.final_cash,
            final_positions,
            trade_fee_cumulative: outcome.trade_fee_cumulative,
        },
        equity: outcome.equity,
    })
}
