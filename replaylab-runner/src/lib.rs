//! ReplayLab Runner: configuration, bar loading and run output.
//!
//! This crate builds on `replaylab-core` to provide:
//! - TOML replay configuration with a deterministic run id
//! - CSV bar loading with forward-fill alignment and synthetic fallback
//! - A single `run_replay` entry point
//! - Artifact export (equity table CSV, report JSON, summary text)

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{ConfigError, ReplayConfig, RunId};
pub use data_loader::{load_bars, DataSource, LoadError, LoadOptions, LoadedData};
pub use export::{export_equity_csv, export_summary, save_artifacts};
pub use runner::{run_replay, run_replay_on_data, ReplayResult, RunError, RunReport};
