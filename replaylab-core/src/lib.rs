//! ReplayLab Core: event-driven bar replay, portfolio ledger, and analytics.
//!
//! This crate contains the simulation pipeline:
//! - Domain types (bars, the event union, signals, orders, fills, instrument universe)
//! - Market data feed contract and an in-memory historical feed
//! - Strategy contract and the moving-average crossover
//! - Portfolio ledger with append-only holdings history
//! - Simulated execution with an exchange fee schedule
//! - Performance analytics (Sharpe, Sortino, moments, drawdown, Calmar, CAGR)
//! - The backtest driver that drains every bar's cascade before the next
//!
//! No file I/O happens here; loading and persistence live in the runner.

pub mod analytics;
pub mod components;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;

pub use error::{CoreError, CoreResult};
