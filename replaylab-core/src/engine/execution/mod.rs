//! Execution simulator: turns order events into fill events.
//!
//! The simulator is deterministic: no latency, no slippage, no partial fills.
//! It fills at the order's reference price, commits a fixed margin per
//! contract, and prices fees from the instrument fee schedule. Fee rows are
//! resolved once per instrument when the simulator is built.

pub mod fee_schedule;

pub use fee_schedule::{FeeRule, FeeSchedule};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::MarketDataFeed;
use crate::domain::{FillEvent, OrderEvent, Universe};
use crate::error::{CoreError, CoreResult};

/// Contract for anything that can execute an order.
///
/// Implementations may read the feed (e.g. for the fill timestamp) but never
/// mutate portfolio state; the returned fill is published back onto the bus.
pub trait ExecutionHandler {
    /// Human-readable name (e.g., "simulated").
    fn name(&self) -> &str;

    /// Execute `order`, producing exactly one fill.
    fn execute(&mut self, order: &OrderEvent, feed: &dyn MarketDataFeed) -> CoreResult<FillEvent>;

    /// Number of instruments the handler resolved per-instrument state for.
    fn instruments(&self) -> Option<usize> {
        None
    }
}

/// Configuration for the simulated execution handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Venue label stamped on every fill.
    pub venue: String,
    /// Margin committed per contract (`fill_cost = quantity * margin_per_contract`).
    pub margin_per_contract: f64,
    pub fee_schedule: FeeSchedule,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            venue: "TAIFEX".to_string(),
            margin_per_contract: 167_000.0,
            fee_schedule: FeeSchedule::taifex(),
        }
    }
}

/// Latency-free, slippage-free market-order simulator.
#[derive(Debug, Clone)]
pub struct SimulatedExecution {
    venue: String,
    margin_per_contract: f64,
    /// Fee row per instrument, indexed by `InstrumentId`.
    fee_rules: Vec<FeeRule>,
}

impl SimulatedExecution {
    pub fn new(universe: &Universe, config: &ExecutionConfig) -> CoreResult<Self> {
        if !config.margin_per_contract.is_finite() || config.margin_per_contract < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "margin_per_contract must be a non-negative number, got {}",
                config.margin_per_contract
            )));
        }
        let fee_rules = universe
            .symbols()
            .iter()
            .map(|symbol| config.fee_schedule.rule_for(symbol).clone())
            .collect();
        Ok(Self {
            venue: config.venue.clone(),
            margin_per_contract: config.margin_per_contract,
            fee_rules,
        })
    }

    /// Fee row resolved for an instrument.
    pub fn fee_rule(&self, order: &OrderEvent) -> CoreResult<&FeeRule> {
        self.fee_rules
            .get(order.instrument.index())
            .ok_or(CoreError::UnknownInstrument(order.instrument))
    }
}

impl ExecutionHandler for SimulatedExecution {
    fn name(&self) -> &str {
        "simulated"
    }

    fn instruments(&self) -> Option<usize> {
        Some(self.fee_rules.len())
    }

    fn execute(&mut self, order: &OrderEvent, feed: &dyn MarketDataFeed) -> CoreResult<FillEvent> {
        let rule = self.fee_rule(order)?;
        let timeindex = feed.latest_timestamp(order.instrument)?;
        let fill_cost = order.quantity as f64 * self.margin_per_contract;

        let fill = FillEvent::new(
            timeindex,
            order.instrument,
            self.venue.as_str(),
            order.quantity,
            order.side,
            fill_cost,
            order.reference_price,
            None,
            rule,
        );
        debug!(
            instrument = %order.instrument,
            side = ?order.side,
            quantity = order.quantity,
            price = order.reference_price,
            fee = fill.trade_fee(),
            "order filled"
        );
        Ok(fill)
    }
}
