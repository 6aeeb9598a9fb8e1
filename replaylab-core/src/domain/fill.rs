//! Fill events: realized executions.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::order::OrderSide;
use super::universe::InstrumentId;
use crate::engine::execution::FeeRule;

/// The realized execution of an order.
///
/// Fields are private so a fill cannot change after creation; the trade fee
/// is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    timeindex: NaiveDateTime,
    instrument: InstrumentId,
    venue: String,
    quantity: u64,
    side: OrderSide,
    fill_cost: f64,
    price: f64,
    trade_fee: f64,
}

impl FillEvent {
    /// Create a fill. When `trade_fee` is `None` it is computed once from `fee_rule`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timeindex: NaiveDateTime,
        instrument: InstrumentId,
        venue: impl Into<String>,
        quantity: u64,
        side: OrderSide,
        fill_cost: f64,
        price: f64,
        trade_fee: Option<f64>,
        fee_rule: &FeeRule,
    ) -> Self {
        let trade_fee = trade_fee.unwrap_or_else(|| fee_rule.trade_fee(price, quantity));
        Self {
            timeindex,
            instrument,
            venue: venue.into(),
            quantity,
            side,
            fill_cost,
            price,
            trade_fee,
        }
    }

    pub fn timeindex(&self) -> NaiveDateTime {
        self.timeindex
    }

    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    /// Margin or notional committed by the fill.
    pub fn fill_cost(&self) -> f64 {
        self.fill_cost
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn trade_fee(&self) -> f64 {
        self.trade_fee
    }
}
