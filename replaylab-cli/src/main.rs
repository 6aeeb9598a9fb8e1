//! ReplayLab CLI: run and inspect event-driven replays.
//!
//! Commands:
//! - `run`: execute a replay from a TOML config file and save artifacts
//! - `check`: validate a config file and print its run id
//! - `show`: print the summary of a saved run directory

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use replaylab_runner::export::{export_summary, load_report};
use replaylab_runner::{run_replay, save_artifacts, ReplayConfig};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI: event-driven backtests over historical bars"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a replay from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override `backtest.data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Generate synthetic bars for symbols without a CSV file.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Stop after this many bars.
        #[arg(long)]
        max_bars: Option<usize>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Validate a config file and print its run id.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the summary of a saved run.
    Show {
        /// Run directory containing report.json.
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            synthetic,
            max_bars,
            output_dir,
        } => run_cmd(&config, data_dir, synthetic, max_bars, &output_dir),
        Commands::Check { config } => check_cmd(&config),
        Commands::Show { dir } => show_cmd(&dir),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config(path: &Path) -> Result<ReplayConfig> {
    ReplayConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn run_cmd(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    synthetic: bool,
    max_bars: Option<usize>,
    output_dir: &Path,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = data_dir {
        config.backtest.data_dir = dir;
    }
    if synthetic {
        config.backtest.synthetic = true;
    }
    if max_bars.is_some() {
        config.backtest.max_bars = max_bars;
    }
    config.validate().context("invalid config after overrides")?;

    let result = run_replay(&config).context("replay failed")?;
    print!("{}", export_summary(&result.report));

    let run_dir = save_artifacts(&result, output_dir)?;
    info!(dir = %run_dir.display(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn check_cmd(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let run_id = config.run_id()?;
    println!("Config OK: {}", config_path.display());
    println!("Symbols: {}", config.backtest.symbols.join(", "));
    println!(
        "Windows: {}/{}",
        config.strategy.short_window, config.strategy.long_window
    );
    println!("Run ID: {run_id}");
    Ok(())
}

fn show_cmd(dir: &Path) -> Result<()> {
    let report = load_report(dir)?;
    println!("Run ID: {}", report.run_id);
    println!("Dataset: {}", report.dataset_hash);
    print!("{}", export_summary(&report));
    Ok(())
}
