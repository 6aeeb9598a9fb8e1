//! Replay engine: event bus, portfolio ledger, execution and the driver loop.
//!
//! Control flow per bar:
//!
//! 1. Driver advances the feed and publishes `Market`
//! 2. `Market` → strategy, then ledger snapshot
//! 3. `Signal` → ledger → `Order`
//! 4. `Order` → execution → `Fill`
//! 5. `Fill` → ledger
//!
//! The bus is drained to empty before the next bar.

pub mod bus;
pub mod driver;
pub mod execution;
pub mod ledger;

pub use bus::EventBus;
pub use driver::{Backtest, BacktestOutcome, DriverConfig, DriverState, RunStats};
pub use execution::{ExecutionConfig, ExecutionHandler, FeeRule, FeeSchedule, SimulatedExecution};
pub use ledger::{
    naive_order, EquityRow, EquityTable, HoldingsSnapshot, LedgerReport, PortfolioConfig,
    PortfolioLedger, PositionSnapshot,
};
