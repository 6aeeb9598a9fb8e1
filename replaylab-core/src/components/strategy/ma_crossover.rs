//! Moving average crossover: long when the short mean is above the long mean.
//!
//! Goes long from flat when `short_avg > long_avg` and exits a long when
//! `short_avg < long_avg`. Never opens a short.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::MarketDataFeed;
use crate::domain::{BarField, InstrumentId, SignalDirection, SignalEvent, Universe};
use crate::engine::EventBus;
use crate::error::{CoreError, CoreResult};

use super::Strategy;

/// Per-instrument market state tracked by the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    InLong,
    Flat,
}

/// Parameters for [`MovingAverageCross`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageCrossConfig {
    pub short_window: usize,
    pub long_window: usize,
    /// When false, averages are taken over whatever history exists once at
    /// least one bar is visible. When true, no signal fires until
    /// `long_window` bars are visible.
    pub require_full_window: bool,
    pub strategy_id: u32,
}

impl Default for MovingAverageCrossConfig {
    fn default() -> Self {
        Self {
            short_window: 20,
            long_window: 30,
            require_full_window: false,
            strategy_id: 1,
        }
    }
}

impl MovingAverageCrossConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.short_window == 0 || self.long_window == 0 {
            return Err(CoreError::InvalidConfig(
                "moving average windows must be >= 1".into(),
            ));
        }
        if self.short_window > self.long_window {
            return Err(CoreError::InvalidConfig(format!(
                "short_window ({}) must not exceed long_window ({})",
                self.short_window, self.long_window
            )));
        }
        Ok(())
    }
}

/// Moving average crossover strategy over adjusted closes.
#[derive(Debug, Clone)]
pub struct MovingAverageCross {
    config: MovingAverageCrossConfig,
    state: Vec<MarketState>,
}

impl MovingAverageCross {
    pub fn new(universe: &Universe, config: MovingAverageCrossConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            state: vec![MarketState::Flat; universe.len()],
            config,
        })
    }

    pub fn config(&self) -> &MovingAverageCrossConfig {
        &self.config
    }

    pub fn state(&self, id: InstrumentId) -> CoreResult<MarketState> {
        self.state
            .get(id.index())
            .copied()
            .ok_or(CoreError::UnknownInstrument(id))
    }

    fn evaluate(
        &mut self,
        feed: &dyn MarketDataFeed,
        id: InstrumentId,
    ) -> CoreResult<Option<SignalDirection>> {
        let values = feed.latest_values(id, BarField::AdjClose, self.config.long_window)?;
        if values.is_empty() {
            return Ok(None);
        }
        if self.config.require_full_window && values.len() < self.config.long_window {
            return Ok(None);
        }

        let short_start = values.len().saturating_sub(self.config.short_window);
        let short_avg = mean(&values[short_start..]);
        let long_avg = mean(&values);

        let slot = self
            .state
            .get_mut(id.index())
            .ok_or(CoreError::UnknownInstrument(id))?;
        let direction = match *slot {
            MarketState::Flat if short_avg > long_avg => {
                *slot = MarketState::InLong;
                Some(SignalDirection::Long)
            }
            MarketState::InLong if short_avg < long_avg => {
                *slot = MarketState::Flat;
                Some(SignalDirection::Exit)
            }
            _ => None,
        };
        Ok(direction)
    }
}

impl Strategy for MovingAverageCross {
    fn name(&self) -> &str {
        "moving_average_cross"
    }

    fn instruments(&self) -> Option<usize> {
        Some(self.state.len())
    }

    fn on_market(&mut self, feed: &dyn MarketDataFeed, bus: &mut EventBus) -> CoreResult<()> {
        let ids: Vec<InstrumentId> = feed.universe().ids().collect();
        for id in ids {
            if let Some(direction) = self.evaluate(feed, id)? {
                let timestamp = feed.latest_timestamp(id)?;
                let symbol = feed.universe().symbol(id)?;
                debug!(
                    instrument = symbol,
                    %timestamp,
                    ?direction,
                    "crossover signal"
                );
                bus.publish(SignalEvent::new(
                    self.config.strategy_id,
                    id,
                    timestamp,
                    direction,
                    1.0,
                ));
            }
        }
        Ok(())
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HistoricalFeed;
    use crate::domain::{Bar, Event};
    use chrono::NaiveDate;

    fn feed(closes: &[f64]) -> HistoricalFeed {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                symbol: "TXFC2".into(),
                timestamp: NaiveDate::from_ymd_opt(2021, 3, 1)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap()
                    + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                adj_close: c,
                volume: 10,
            })
            .collect();
        HistoricalFeed::new(vec![("TXFC2".into(), bars)]).unwrap()
    }

    fn config(short: usize, long: usize) -> MovingAverageCrossConfig {
        MovingAverageCrossConfig {
            short_window: short,
            long_window: long,
            ..Default::default()
        }
    }

    /// Step the feed through every bar and collect signal directions.
    fn run(closes: &[f64], cfg: MovingAverageCrossConfig) -> Vec<(usize, SignalDirection)> {
        let mut feed = feed(closes);
        let mut strategy = MovingAverageCross::new(feed.universe(), cfg).unwrap();
        let mut bus = EventBus::new();
        let mut out = Vec::new();
        for i in 0..closes.len() {
            feed.advance_all().unwrap();
            strategy.on_market(&feed, &mut bus).unwrap();
            while let Some(event) = bus.poll() {
                if let Event::Signal(s) = event {
                    out.push((i, s.direction));
                }
            }
        }
        out
    }

    #[test]
    fn single_bar_window_never_signals() {
        // short and long averages are identical with one value.
        assert!(run(&[100.0], config(2, 3)).is_empty());
    }

    #[test]
    fn rising_then_falling_prices_emit_long_then_exit() {
        let closes = [10.0, 11.0, 12.0, 13.0, 9.0, 8.0, 7.0];
        let signals = run(&closes, config(2, 3));
        assert_eq!(
            signals,
            vec![(2, SignalDirection::Long), (4, SignalDirection::Exit)]
        );
    }

    #[test]
    fn no_repeat_long_while_in_long() {
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let signals = run(&closes, config(2, 3));
        assert_eq!(signals, vec![(2, SignalDirection::Long)]);
    }

    #[test]
    fn full_window_policy_delays_first_signal() {
        let closes = [10.0, 11.0, 12.0, 13.0];
        // A partial window already crosses on the second bar.
        assert_eq!(run(&closes, config(1, 3)), vec![(1, SignalDirection::Long)]);
        let cfg = MovingAverageCrossConfig {
            require_full_window: true,
            ..config(1, 3)
        };
        assert_eq!(run(&closes, cfg), vec![(2, SignalDirection::Long)]);
    }

    #[test]
    fn exit_requires_prior_long() {
        let closes = [10.0, 9.0, 8.0, 7.0];
        assert!(run(&closes, config(2, 3)).is_empty());
    }

    #[test]
    fn invalid_windows_rejected() {
        let f = feed(&[1.0]);
        assert!(MovingAverageCross::new(f.universe(), config(0, 3)).is_err());
        assert!(MovingAverageCross::new(f.universe(), config(5, 3)).is_err());
    }

    #[test]
    fn state_tracks_position_intent() {
        let mut f = feed(&[10.0, 11.0]);
        let mut strategy = MovingAverageCross::new(f.universe(), config(1, 2)).unwrap();
        let mut bus = EventBus::new();
        f.advance_all().unwrap();
        strategy.on_market(&f, &mut bus).unwrap();
        assert_eq!(strategy.state(InstrumentId(0)).unwrap(), MarketState::Flat);
        f.advance_all().unwrap();
        strategy.on_market(&f, &mut bus).unwrap();
        assert_eq!(strategy.state(InstrumentId(0)).unwrap(), MarketState::InLong);
        assert_eq!(bus.len(), 1);
    }
}
