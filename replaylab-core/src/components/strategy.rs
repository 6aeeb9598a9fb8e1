//! Strategy contract: turns market updates into trading signals.
//!
//! Strategies only read the feed and publish `Signal` events. They never see
//! positions or cash; sizing and order generation belong to the ledger.

pub mod ma_crossover;

pub use ma_crossover::{MarketState, MovingAverageCross, MovingAverageCrossConfig};

use crate::data::MarketDataFeed;
use crate::engine::EventBus;
use crate::error::CoreResult;

/// Trait for signal-producing strategies.
///
/// `on_market` is called once per Market event, after the feed has made a new
/// row of bars visible. Implementations may publish any number of signals.
pub trait Strategy {
    /// Human-readable name (e.g., "moving_average_cross").
    fn name(&self) -> &str;

    /// React to a new row of bars.
    fn on_market(&mut self, feed: &dyn MarketDataFeed, bus: &mut EventBus) -> CoreResult<()>;

    /// Number of instruments the strategy keeps state for, if it is bound
    /// to a universe.
    fn instruments(&self) -> Option<usize> {
        None
    }
}
