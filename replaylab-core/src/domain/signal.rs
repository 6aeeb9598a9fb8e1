//! Signal events: a strategy's directional recommendation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::universe::InstrumentId;

/// Directional intent of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalDirection {
    Long,
    Short,
    Exit,
}

/// An immutable recommendation emitted by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub strategy_id: u32,
    pub instrument: InstrumentId,
    /// Timestamp of the bar that produced the signal.
    pub timestamp: NaiveDateTime,
    pub direction: SignalDirection,
    /// Conviction in `[0, 1]`.
    pub strength: f64,
}

impl SignalEvent {
    /// Build a signal, clamping strength into `[0, 1]`.
    pub fn new(
        strategy_id: u32,
        instrument: InstrumentId,
        timestamp: NaiveDateTime,
        direction: SignalDirection,
        strength: f64,
    ) -> Self {
        let strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        Self {
            strategy_id,
            instrument,
            timestamp,
            direction,
            strength,
        }
    }
}
