//! Backtest driver: the cooperative replay loop.
//!
//! Each step advances every instrument by one bar, publishes a Market event,
//! and drains the bus until it is empty. Events published during the drain
//! are processed in the same drain, so every signal, order and fill caused by
//! bar *t* is applied before bar *t+1* becomes visible.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analytics::{PerformanceReport, ReportOptions};
use crate::components::Strategy;
use crate::data::MarketDataFeed;
use crate::domain::{Event, OrderEvent};
use crate::engine::bus::EventBus;
use crate::engine::execution::ExecutionHandler;
use crate::engine::ledger::{EquityTable, PortfolioLedger};
use crate::error::{CoreError, CoreResult};

/// Lifecycle of a [`Backtest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Init,
    /// A bar has been published and its cascade is being drained.
    Running,
    /// The last bar's cascade resolved; waiting for the next bar.
    DrainedPerBar,
    Finished,
}

/// Loop pacing and limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Pause between bars in milliseconds; 0 disables pacing.
    pub heartbeat_ms: u64,
    /// Stop after this many bars even if the feed has more.
    pub max_bars: Option<usize>,
    pub report: ReportOptions,
}

impl DriverConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

/// Event counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub bars: usize,
    pub signals: usize,
    pub orders: usize,
    pub fills: usize,
}

/// Final output of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestOutcome {
    pub stats: RunStats,
    pub equity: EquityTable,
    pub report: PerformanceReport,
    pub final_cash: f64,
    pub final_positions: Vec<i64>,
    pub trade_fee_cumulative: f64,
}

/// Event-driven backtest over one feed, strategy, ledger and execution handler.
pub struct Backtest {
    feed: Box<dyn MarketDataFeed>,
    strategy: Box<dyn Strategy>,
    ledger: PortfolioLedger,
    execution: Box<dyn ExecutionHandler>,
    bus: EventBus,
    config: DriverConfig,
    state: DriverState,
    stats: RunStats,
}

impl Backtest {
    /// Wire the components together.
    ///
    /// Fails with `InvalidConfig` when the ledger, strategy or execution
    /// handler was built for a different universe than the feed, or when the
    /// feed's next bar does not come strictly after the ledger's last
    /// snapshot (normally the initial-capital row at `start_date`).
    pub fn new(
        feed: Box<dyn MarketDataFeed>,
        strategy: Box<dyn Strategy>,
        ledger: PortfolioLedger,
        execution: Box<dyn ExecutionHandler>,
        config: DriverConfig,
    ) -> CoreResult<Self> {
        let universe = feed.universe();
        if ledger.universe() != universe {
            return Err(CoreError::InvalidConfig(format!(
                "ledger tracks {:?} but the feed serves {:?}",
                ledger.universe().symbols(),
                universe.symbols()
            )));
        }
        for (component, count) in [
            (strategy.name(), strategy.instruments()),
            (execution.name(), execution.instruments()),
        ] {
            if let Some(n) = count.filter(|&n| n != universe.len()) {
                return Err(CoreError::InvalidConfig(format!(
                    "{component} was built for {n} instruments, feed serves {}",
                    universe.len()
                )));
            }
        }

        let first = universe.ids().next().ok_or(CoreError::EmptyUniverse)?;
        let last_snapshot = ledger
            .holdings()
            .last()
            .map_or(ledger.start_date(), |h| h.timestamp);
        if let Some(next) = feed.peek_timestamp(first)? {
            if next <= last_snapshot {
                return Err(CoreError::InvalidConfig(format!(
                    "first bar at {next} is not after the ledger start {last_snapshot}"
                )));
            }
        }

        Ok(Self {
            feed,
            strategy,
            ledger,
            execution,
            bus: EventBus::new(),
            config,
            state: DriverState::Init,
            stats: RunStats::default(),
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn feed(&self) -> &dyn MarketDataFeed {
        self.feed.as_ref()
    }

    /// Queue a manual order. It is executed during the next drain.
    pub fn submit_order(&mut self, order: OrderEvent) {
        debug!(instrument = %order.instrument, side = ?order.side, quantity = order.quantity, "manual order");
        self.bus.publish(order);
    }

    /// Replay one bar and drain its cascade.
    ///
    /// Returns `false` once the feed is exhausted or the bar cap is reached.
    pub fn step(&mut self) -> CoreResult<bool> {
        if self.state == DriverState::Finished {
            return Ok(false);
        }
        if !self.has_next_bar() {
            self.state = DriverState::Finished;
            return Ok(false);
        }

        self.state = DriverState::Running;
        self.feed.advance_all()?;
        self.bus.publish(Event::Market);
        self.stats.bars += 1;
        self.drain()?;
        self.state = DriverState::DrainedPerBar;
        Ok(true)
    }

    /// Poll and dispatch until the bus is empty, including events published
    /// while draining.
    pub fn drain(&mut self) -> CoreResult<()> {
        while let Some(event) = self.bus.poll() {
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> CoreResult<()> {
        match event {
            Event::Market => {
                self.strategy.on_market(self.feed.as_ref(), &mut self.bus)?;
                self.ledger.on_market(self.feed.as_ref())?;
            }
            Event::Signal(signal) => {
                self.stats.signals += 1;
                self.ledger
                    .on_signal(&signal, self.feed.as_ref(), &mut self.bus)?;
            }
            Event::Order(order) => {
                self.stats.orders += 1;
                let fill = self.execution.execute(&order, self.feed.as_ref())?;
                self.bus.publish(fill);
            }
            Event::Fill(fill) => {
                self.stats.fills += 1;
                self.ledger.on_fill(&fill)?;
            }
        }
        Ok(())
    }

    /// Run until the feed is exhausted (or the bar cap is hit) and produce
    /// the final report.
    pub fn run(&mut self) -> CoreResult<BacktestOutcome> {
        info!(
            strategy = self.strategy.name(),
            execution = self.execution.name(),
            instruments = self.feed.universe().len(),
            "backtest started"
        );
        let heartbeat = self.config.heartbeat();
        while self.step()? {
            if !heartbeat.is_zero() && self.has_next_bar() {
                std::thread::sleep(heartbeat);
            }
        }
        self.finish()
    }

    /// Whether the next `step` would replay another bar.
    fn has_next_bar(&self) -> bool {
        let capped = self
            .config
            .max_bars
            .is_some_and(|cap| self.stats.bars >= cap);
        !capped && self.feed.has_more()
    }

    /// Mark the run finished and finalize the ledger.
    pub fn finish(&mut self) -> CoreResult<BacktestOutcome> {
        self.state = DriverState::Finished;
        let out = self.ledger.finalize_report(&self.config.report);
        let final_positions = self
            .feed
            .universe()
            .ids()
            .map(|id| self.ledger.position(id))
            .collect::<CoreResult<Vec<i64>>>()?;

        info!(
            bars = self.stats.bars,
            signals = self.stats.signals,
            orders = self.stats.orders,
            fills = self.stats.fills,
            total_return = out.report.total_return,
            cash = self.ledger.cash(),
            "backtest finished"
        );

        Ok(BacktestOutcome {
            stats: self.stats,
            equity: out.table,
            report: out.report,
            final_cash: self.ledger.cash(),
            final_positions,
            trade_fee_cumulative: self.ledger.trade_fee_cumulative(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MovingAverageCross, MovingAverageCrossConfig};
    use crate::data::HistoricalFeed;
    use crate::domain::{Bar, InstrumentId, OrderSide, Universe};
    use crate::engine::execution::{ExecutionConfig, SimulatedExecution};
    use crate::engine::ledger::PortfolioConfig;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, day)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap()
    }

    fn feed(closes: &[f64]) -> HistoricalFeed {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                symbol: "TXFC2".into(),
                timestamp: ts(2 + i as u32),
                open: c,
                high: c,
                low: c,
                close: c,
                adj_close: c,
                volume: 1,
            })
            .collect();
        HistoricalFeed::new(vec![("TXFC2".into(), bars)]).unwrap()
    }

    fn strategy(universe: &Universe) -> MovingAverageCross {
        MovingAverageCross::new(
            universe,
            MovingAverageCrossConfig {
                short_window: 1,
                long_window: 2,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn backtest_from(
        closes: &[f64],
        config: DriverConfig,
        start: NaiveDateTime,
    ) -> CoreResult<Backtest> {
        let feed = feed(closes);
        let universe = feed.universe().clone();
        let ledger = PortfolioLedger::new(&universe, &PortfolioConfig::default(), start).unwrap();
        let execution = SimulatedExecution::new(&universe, &ExecutionConfig::default()).unwrap();
        Backtest::new(
            Box::new(feed),
            Box::new(strategy(&universe)),
            ledger,
            Box::new(execution),
            config,
        )
    }

    fn backtest(closes: &[f64], config: DriverConfig) -> Backtest {
        backtest_from(closes, config, ts(1)).unwrap()
    }

    #[test]
    fn state_machine_walks_to_finished() {
        let mut bt = backtest(&[100.0, 101.0], DriverConfig::default());
        assert_eq!(bt.state(), DriverState::Init);
        assert!(bt.step().unwrap());
        assert_eq!(bt.state(), DriverState::DrainedPerBar);
        assert!(bt.step().unwrap());
        assert!(!bt.step().unwrap());
        assert_eq!(bt.state(), DriverState::Finished);
        assert!(!bt.step().unwrap());
    }

    #[test]
    fn cascade_resolves_within_the_bar() {
        let mut bt = backtest(&[100.0, 101.0, 102.0], DriverConfig::default());
        bt.step().unwrap();
        bt.step().unwrap();
        // Bar 2 crosses: signal, order and fill all land before returning.
        assert_eq!(
            bt.stats(),
            RunStats {
                bars: 2,
                signals: 1,
                orders: 1,
                fills: 1
            }
        );
        assert_eq!(bt.ledger().position(InstrumentId(0)).unwrap(), 100);
    }

    #[test]
    fn holdings_length_is_bars_plus_one() {
        let mut bt = backtest(&[100.0, 101.0, 99.0, 98.0], DriverConfig::default());
        let out = bt.run().unwrap();
        assert_eq!(out.stats.bars, 4);
        assert_eq!(out.equity.rows.len(), 5);
        assert!(out
            .equity
            .rows
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn max_bars_caps_the_replay() {
        let config = DriverConfig {
            max_bars: Some(2),
            ..Default::default()
        };
        let mut bt = backtest(&[100.0, 101.0, 102.0, 103.0], config);
        let out = bt.run().unwrap();
        assert_eq!(out.stats.bars, 2);
        assert_eq!(bt.state(), DriverState::Finished);
        assert!(bt.feed().has_more());
    }

    #[test]
    fn manual_order_fills_in_next_drain() {
        let mut bt = backtest(&[100.0, 100.0], DriverConfig::default());
        bt.step().unwrap();
        bt.submit_order(OrderEvent::market(InstrumentId(0), 100.0, 3, OrderSide::Sell));
        bt.drain().unwrap();
        assert_eq!(bt.ledger().position(InstrumentId(0)).unwrap(), -3);
        assert_eq!(bt.stats().fills, 1);
        assert_eq!(bt.stats().signals, 0);
    }

    #[test]
    fn first_bar_at_start_date_is_rejected() {
        // Bars begin at ts(2); a ledger starting there would hold two rows
        // stamped with the same instant.
        let err = backtest_from(&[100.0, 101.0], DriverConfig::default(), ts(2)).err();
        assert!(matches!(err, Some(CoreError::InvalidConfig(_))));

        let err = backtest_from(&[100.0, 101.0], DriverConfig::default(), ts(3)).err();
        assert!(matches!(err, Some(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn ledger_for_another_universe_is_rejected() {
        let feed = feed(&[100.0, 101.0]);
        let universe = feed.universe().clone();
        let other = Universe::new(["TXFC2", "MXFC2"]).unwrap();
        let ledger = PortfolioLedger::new(&other, &PortfolioConfig::default(), ts(1)).unwrap();
        let execution = SimulatedExecution::new(&universe, &ExecutionConfig::default()).unwrap();
        let err = Backtest::new(
            Box::new(feed),
            Box::new(strategy(&universe)),
            ledger,
            Box::new(execution),
            DriverConfig::default(),
        )
        .err();
        assert!(matches!(err, Some(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn execution_for_another_universe_is_rejected() {
        let feed = feed(&[100.0, 101.0]);
        let universe = feed.universe().clone();
        let other = Universe::new(["TXFC2", "MXFC2"]).unwrap();
        let ledger = PortfolioLedger::new(&universe, &PortfolioConfig::default(), ts(1)).unwrap();
        let execution = SimulatedExecution::new(&other, &ExecutionConfig::default()).unwrap();
        let err = Backtest::new(
            Box::new(feed),
            Box::new(strategy(&universe)),
            ledger,
            Box::new(execution),
            DriverConfig::default(),
        )
        .err();
        assert!(matches!(err, Some(CoreError::InvalidConfig(msg)) if msg.contains("simulated")));
    }

    #[test]
    fn heartbeat_paces_between_bars_only() {
        let config = DriverConfig {
            heartbeat_ms: 50,
            ..Default::default()
        };
        let mut bt = backtest(&[100.0, 101.0, 102.0], config);
        let started = std::time::Instant::now();
        let out = bt.run().unwrap();
        let elapsed = started.elapsed();
        assert_eq!(out.stats.bars, 3);
        // Two gaps between three bars; no pause after the last one.
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(150), "{elapsed:?}");
    }

    #[test]
    fn heartbeat_skipped_once_bar_cap_is_reached() {
        let config = DriverConfig {
            heartbeat_ms: 40,
            max_bars: Some(1),
            ..Default::default()
        };
        let mut bt = backtest(&[100.0, 101.0, 102.0], config);
        let started = std::time::Instant::now();
        bt.run().unwrap();
        assert!(started.elapsed() < Duration::from_millis(40));
    }
}
