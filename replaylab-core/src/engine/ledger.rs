//! Portfolio ledger: positions, cash, and the append-only holdings history.
//!
//! The ledger turns signals into orders, applies fills exactly once, and
//! records one position snapshot and one holdings snapshot per bar. The
//! accounting identity `total == cash + Σ position × adj_close` holds at every
//! snapshot.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::{EquitySeries, PerformanceReport, ReportOptions};
use crate::data::MarketDataFeed;
use crate::domain::{
    BarField, FillEvent, InstrumentId, OrderEvent, OrderSide, SignalDirection, SignalEvent,
    Universe,
};
use crate::engine::EventBus;
use crate::error::{CoreError, CoreResult};

// ─── Configuration ──────────────────────────────────────────────────

/// Capital and sizing for the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub initial_capital: f64,
    /// Contracts per entry order.
    pub fixed_quantity: u64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: 5_000_000.0,
            fixed_quantity: 100,
        }
    }
}

impl PortfolioConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.fixed_quantity == 0 {
            return Err(CoreError::InvalidConfig(
                "fixed_quantity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ─── Snapshots ──────────────────────────────────────────────────────

/// Per-bar record of signed positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub timestamp: NaiveDateTime,
    pub quantities: Vec<i64>,
}

/// Per-bar valuation of cash plus every instrument's marked value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub trade_fee_cumulative: f64,
    pub total: f64,
    /// Marked value per instrument, indexed by `InstrumentId`.
    pub values: Vec<f64>,
}

impl HoldingsSnapshot {
    /// `total - (cash + Σ values)`; zero up to float accumulation.
    pub fn equity_drift(&self) -> f64 {
        self.total - (self.cash + self.values.iter().sum::<f64>())
    }
}

/// Live (not yet snapshotted) holdings.
#[derive(Debug, Clone, PartialEq)]
struct CurrentHoldings {
    cash: f64,
    trade_fee_cumulative: f64,
    total: f64,
    values: Vec<f64>,
}

// ─── Equity table ───────────────────────────────────────────────────

/// One row of the persisted run output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<f64>,
    pub cash: f64,
    pub trade_fee_cumulative: f64,
    pub total: f64,
    pub returns: f64,
    pub equity_curve: f64,
    pub drawdown: f64,
}

/// The holdings history joined with its derived series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityTable {
    pub symbols: Vec<String>,
    pub rows: Vec<EquityRow>,
}

/// Everything produced when the ledger is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReport {
    pub table: EquityTable,
    pub report: PerformanceReport,
}

// ─── Order rule ─────────────────────────────────────────────────────

/// Naive fixed-size order rule keyed on `(direction, sign(current))`.
///
/// Returns the side and quantity of the order to send, or `None` when the
/// signal does not apply to the current position.
pub fn naive_order(
    direction: SignalDirection,
    current: i64,
    fixed_quantity: u64,
) -> Option<(OrderSide, u64)> {
    match (direction, current.signum()) {
        (SignalDirection::Long, 0) => Some((OrderSide::Buy, fixed_quantity)),
        (SignalDirection::Short, 0) => Some((OrderSide::Sell, fixed_quantity)),
        (SignalDirection::Exit, 1) => Some((OrderSide::Sell, current.unsigned_abs())),
        (SignalDirection::Exit, -1) => Some((OrderSide::Buy, current.unsigned_abs())),
        _ => None,
    }
}

// ─── Ledger ─────────────────────────────────────────────────────────

/// Owner of all position and cash state for a run.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    universe: Universe,
    initial_capital: f64,
    fixed_quantity: u64,
    start_date: NaiveDateTime,
    current_positions: Vec<i64>,
    current: CurrentHoldings,
    all_positions: Vec<PositionSnapshot>,
    all_holdings: Vec<HoldingsSnapshot>,
}

impl PortfolioLedger {
    /// Create a ledger whose history starts with the initial-capital snapshot
    /// at `start_date`.
    pub fn new(
        universe: &Universe,
        config: &PortfolioConfig,
        start_date: NaiveDateTime,
    ) -> CoreResult<Self> {
        config.validate()?;
        let n = universe.len();
        let current = CurrentHoldings {
            cash: config.initial_capital,
            trade_fee_cumulative: 0.0,
            total: config.initial_capital,
            values: vec![0.0; n],
        };
        Ok(Self {
            universe: universe.clone(),
            initial_capital: config.initial_capital,
            fixed_quantity: config.fixed_quantity,
            start_date,
            current_positions: vec![0; n],
            all_positions: vec![PositionSnapshot {
                timestamp: start_date,
                quantities: vec![0; n],
            }],
            all_holdings: vec![HoldingsSnapshot {
                timestamp: start_date,
                cash: current.cash,
                trade_fee_cumulative: 0.0,
                total: current.total,
                values: current.values.clone(),
            }],
            current,
        })
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn start_date(&self) -> NaiveDateTime {
        self.start_date
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn cash(&self) -> f64 {
        self.current.cash
    }

    pub fn trade_fee_cumulative(&self) -> f64 {
        self.current.trade_fee_cumulative
    }

    /// Running total; only exact at snapshot time.
    pub fn total(&self) -> f64 {
        self.current.total
    }

    /// Signed position of `id`.
    pub fn position(&self, id: InstrumentId) -> CoreResult<i64> {
        self.current_positions
            .get(id.index())
            .copied()
            .ok_or(CoreError::UnknownInstrument(id))
    }

    /// Signed position looked up by symbol.
    pub fn position_of(&self, symbol: &str) -> CoreResult<i64> {
        self.position(self.universe.resolve(symbol)?)
    }

    pub fn positions_history(&self) -> &[PositionSnapshot] {
        &self.all_positions
    }

    pub fn holdings(&self) -> &[HoldingsSnapshot] {
        &self.all_holdings
    }

    // ── Event handlers ──

    /// Append this bar's position and holdings snapshots, marked at the
    /// latest adjusted close.
    pub fn on_market(&mut self, feed: &dyn MarketDataFeed) -> CoreResult<()> {
        let first = self.universe.ids().next().ok_or(CoreError::EmptyUniverse)?;
        let timestamp = feed.latest_timestamp(first)?;

        let mut values = Vec::with_capacity(self.current_positions.len());
        for (idx, &qty) in self.current_positions.iter().enumerate() {
            let price = feed.latest_value(InstrumentId(idx), BarField::AdjClose)?;
            values.push(qty as f64 * price);
        }
        let total = self.current.cash + values.iter().sum::<f64>();

        self.current.values.clone_from(&values);
        self.current.total = total;

        self.all_positions.push(PositionSnapshot {
            timestamp,
            quantities: self.current_positions.clone(),
        });
        self.all_holdings.push(HoldingsSnapshot {
            timestamp,
            cash: self.current.cash,
            trade_fee_cumulative: self.current.trade_fee_cumulative,
            total,
            values,
        });
        Ok(())
    }

    /// Order implied by `signal` under the fixed-size rule, priced at the
    /// instrument's latest adjusted close.
    pub fn generate_order(
        &self,
        signal: &SignalEvent,
        feed: &dyn MarketDataFeed,
    ) -> CoreResult<Option<OrderEvent>> {
        let current = self.position(signal.instrument)?;
        let Some((side, quantity)) = naive_order(signal.direction, current, self.fixed_quantity)
        else {
            return Ok(None);
        };
        let price = feed.latest_value(signal.instrument, BarField::AdjClose)?;
        Ok(Some(OrderEvent::market(signal.instrument, price, quantity, side)))
    }

    /// Translate a signal into at most one order on the bus.
    pub fn on_signal(
        &mut self,
        signal: &SignalEvent,
        feed: &dyn MarketDataFeed,
        bus: &mut EventBus,
    ) -> CoreResult<bool> {
        match self.generate_order(signal, feed)? {
            Some(order) => {
                debug!(
                    instrument = %signal.instrument,
                    side = ?order.side,
                    quantity = order.quantity,
                    price = order.reference_price,
                    "order generated"
                );
                bus.publish(order);
                Ok(true)
            }
            None => {
                let position = self.position(signal.instrument)?;
                warn!(
                    instrument = %signal.instrument,
                    direction = ?signal.direction,
                    position,
                    "signal ignored for current position"
                );
                Ok(false)
            }
        }
    }

    /// Apply a fill to positions and cash.
    pub fn on_fill(&mut self, fill: &FillEvent) -> CoreResult<()> {
        let id = fill.instrument();
        let idx = id.index();
        let position = self
            .current_positions
            .get_mut(idx)
            .ok_or(CoreError::UnknownInstrument(id))?;
        let sign = fill.side().sign();
        *position += sign * fill.quantity() as i64;

        let cost = sign as f64 * fill.price() * fill.quantity() as f64;
        let fee = fill.trade_fee();
        self.current.values[idx] += cost;
        self.current.cash -= cost + fee;
        self.current.trade_fee_cumulative += fee;
        self.current.total -= fee;

        debug!(
            instrument = %id,
            side = ?fill.side(),
            quantity = fill.quantity(),
            price = fill.price(),
            fee,
            cash = self.current.cash,
            "fill applied"
        );
        Ok(())
    }

    // ── Reporting ──

    /// Join the holdings history with returns, equity curve and drawdown,
    /// and compute the performance report.
    pub fn finalize_report(&self, options: &ReportOptions) -> LedgerReport {
        let totals: Vec<f64> = self.all_holdings.iter().map(|h| h.total).collect();
        let timestamps: Vec<NaiveDateTime> =
            self.all_holdings.iter().map(|h| h.timestamp).collect();
        let instrument_values: Vec<Vec<f64>> = (0..self.universe.len())
            .map(|i| self.all_holdings.iter().map(|h| h.values[i]).collect())
            .collect();

        let series = EquitySeries::from_totals(&totals, options.hwm_seed);
        let report = PerformanceReport::compute(
            &timestamps,
            &totals,
            &instrument_values,
            &series,
            options,
        );
        if report.win_rate.is_none() {
            warn!("no completed round trips; win rate undefined");
        }
        if report.profit_factor.is_none() {
            warn!(round_trips = report.round_trips, "no losing round trips; profit factor undefined");
        }

        let rows = self
            .all_holdings
            .iter()
            .enumerate()
            .map(|(t, h)| EquityRow {
                timestamp: h.timestamp,
                values: h.values.clone(),
                cash: h.cash,
                trade_fee_cumulative: h.trade_fee_cumulative,
                total: h.total,
                returns: series.returns[t],
                equity_curve: series.equity_curve[t],
                drawdown: series.drawdowns.series[t],
            })
            .collect();

        LedgerReport {
            table: EquityTable {
                symbols: self.universe.symbols().to_vec(),
                rows,
            },
            report,
        }
    }
}
