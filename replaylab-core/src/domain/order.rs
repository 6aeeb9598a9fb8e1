//! Order events sent from the ledger to execution.

use serde::{Deserialize, Serialize};

use super::universe::InstrumentId;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// `+1` for buys, `-1` for sells.
    pub fn sign(self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

/// Order kind. Only market orders are simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
}

/// A request to trade `quantity` units of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub instrument: InstrumentId,
    /// Latest adjusted close when the order was generated.
    pub reference_price: f64,
    pub quantity: u64,
    pub kind: OrderKind,
    pub side: OrderSide,
}

impl OrderEvent {
    pub fn market(instrument: InstrumentId, reference_price: f64, quantity: u64, side: OrderSide) -> Self {
        Self {
            instrument,
            reference_price,
            quantity,
            kind: OrderKind::Market,
            side,
        }
    }
}
