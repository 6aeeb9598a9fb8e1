//! Performance analytics: pure functions over the realized equity series.
//!
//! Every ratio guards its denominator and returns 0.0 instead of a
//! non-finite value. Standard deviations use the population form (divide by
//! `n`). Win rate and profit factor are `None` when no completed round trip
//! exists to define them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Trading days per year used to annualize CAGR.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

// ─── Options ────────────────────────────────────────────────────────

/// Seed for the drawdown high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwmSeed {
    /// `hwm[0] = 0`. Keeps reports comparable with earlier runs.
    #[default]
    Zero,
    /// `hwm[0] = equity_curve[0]`, the conventional definition.
    FirstValue,
}

/// Knobs that shape the final report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Annualization factor. `None` uses the number of holdings rows.
    pub periods: Option<usize>,
    pub hwm_seed: HwmSeed,
}

// ─── Basic statistics ───────────────────────────────────────────────

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Central moment of order `k`.
fn central_moment(values: &[f64], k: i32) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(k)).sum::<f64>() / values.len() as f64
}

// ─── Series ─────────────────────────────────────────────────────────

/// Period returns `r_t = total_t / total_{t-1} - 1` for `t >= 1`.
///
/// A zero previous total yields a 0.0 return rather than infinity.
pub fn period_returns(totals: &[f64]) -> Vec<f64> {
    totals
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

/// Compounded equity curve `E_t = Π (1 + r_i)`, starting from 1.0.
///
/// The result is one longer than `returns`: `E_0 = 1.0` stands for the
/// initial-capital row.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut acc = 1.0;
    curve.push(acc);
    for r in returns {
        acc *= 1.0 + r;
        curve.push(acc);
    }
    curve
}

// ─── Ratios ─────────────────────────────────────────────────────────

/// Sharpe ratio against a zero benchmark: `(annualized, per_period)`.
pub fn sharpe(returns: &[f64], periods: usize) -> (f64, f64) {
    let sd = std_dev(returns);
    if sd == 0.0 || !sd.is_finite() {
        return (0.0, 0.0);
    }
    let per_period = mean(returns) / sd;
    ((periods as f64).sqrt() * per_period, per_period)
}

/// Sortino ratio: `(annualized, per_period)`.
///
/// The downside set is every return strictly below the mean return; the
/// annualized figure divides by its stdev. The per-period figure keeps the
/// full-series stdev, so it equals the per-period Sharpe. Both are 0.0 when
/// the downside stdev is zero.
pub fn sortino(returns: &[f64], periods: usize) -> (f64, f64) {
    let m = mean(returns);
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < m).collect();
    let downside_sd = std_dev(&downside);
    if downside_sd == 0.0 || !downside_sd.is_finite() {
        return (0.0, 0.0);
    }
    let annualized = (periods as f64).sqrt() * m / downside_sd;
    let sd = std_dev(returns);
    let per_period = if sd == 0.0 { 0.0 } else { m / sd };
    (annualized, per_period)
}

/// Adjusted Fisher-Pearson sample skewness.
///
/// 0.0 with fewer than three samples or zero variance.
pub fn skewness(returns: &[f64]) -> f64 {
    let n = returns.len() as f64;
    if returns.len() < 3 {
        return 0.0;
    }
    let m2 = central_moment(returns, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    let g1 = central_moment(returns, 3) / m2.powf(1.5);
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Bias-adjusted excess kurtosis.
///
/// 0.0 with fewer than four samples or zero variance.
pub fn kurtosis(returns: &[f64]) -> f64 {
    let n = returns.len() as f64;
    if returns.len() < 4 {
        return 0.0;
    }
    let m2 = central_moment(returns, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    let g2 = central_moment(returns, 4) / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// Calmar ratio from the geometric mean return over `periods`.
pub fn calmar(returns: &[f64], periods: usize, max_drawdown: f64) -> f64 {
    if max_drawdown == 0.0 || periods == 0 {
        return 0.0;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    if growth < 0.0 {
        return 0.0;
    }
    let geometric_mean = growth.powf(1.0 / periods as f64) - 1.0;
    let ratio = geometric_mean / max_drawdown.abs();
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Compound annual growth rate over `days` calendar days.
///
/// `(last / first)^(1 / (days / 252)) - 1`. 0.0 for a zero span or a
/// non-positive start or end value.
pub fn cagr(first_total: f64, last_total: f64, days: i64) -> f64 {
    if days <= 0 || first_total <= 0.0 || last_total <= 0.0 {
        return 0.0;
    }
    let years = days as f64 / TRADING_DAYS_PER_YEAR;
    let value = (last_total / first_total).powf(1.0 / years) - 1.0;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// ─── Drawdown ───────────────────────────────────────────────────────

/// Result of the high-water-mark scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawdowns {
    /// `hwm[t] - curve[t]`; the first entry is always 0.0.
    pub series: Vec<f64>,
    /// Consecutive bars below the high-water mark.
    pub durations: Vec<usize>,
    pub max_drawdown: f64,
    pub max_duration: usize,
}

/// Sequential high-water-mark scan over an equity curve.
pub fn drawdowns(curve: &[f64], seed: HwmSeed) -> Drawdowns {
    let n = curve.len();
    let mut series = vec![0.0; n];
    let mut durations = vec![0usize; n];
    let mut hwm = match (seed, curve.first()) {
        (HwmSeed::FirstValue, Some(&first)) => first,
        _ => 0.0,
    };

    for t in 1..n {
        hwm = hwm.max(curve[t]);
        let dd = hwm - curve[t];
        series[t] = dd;
        durations[t] = if dd == 0.0 { 0 } else { durations[t - 1] + 1 };
    }

    let max_drawdown = series.iter().copied().fold(0.0, f64::max);
    let max_duration = durations.iter().copied().max().unwrap_or(0);
    Drawdowns {
        series,
        durations,
        max_drawdown,
        max_duration,
    }
}

// ─── Round trips ────────────────────────────────────────────────────

/// One entry-to-exit cycle detected from an instrument's marked value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    /// Row where the value first became nonzero.
    pub entry_row: usize,
    /// Last nonzero row before the value returned to zero.
    pub exit_row: usize,
    pub entry_value: f64,
    pub exit_value: f64,
}

impl RoundTrip {
    pub fn profit(&self) -> f64 {
        self.exit_value - self.entry_value
    }
}

/// Scan one instrument's per-row marked value for zero→nonzero entries and
/// nonzero→zero exits, paired in order. An open position at the end of the
/// series is not a round trip.
pub fn round_trips(values: &[f64]) -> Vec<RoundTrip> {
    let mut trips = Vec::new();
    let mut entry: Option<(usize, f64)> = None;
    for (j, w) in values.windows(2).enumerate() {
        let (prev, next) = (w[0], w[1]);
        if prev == 0.0 && next != 0.0 {
            entry = Some((j + 1, next));
        }
        if prev != 0.0 && next == 0.0 {
            if let Some((entry_row, entry_value)) = entry.take() {
                trips.push(RoundTrip {
                    entry_row,
                    exit_row: j,
                    entry_value,
                    exit_value: prev,
                });
            }
        }
    }
    trips
}

/// Win/loss aggregates over a set of round trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub round_trips: usize,
    pub wins: usize,
    pub losses: usize,
    /// `wins / round_trips`; `None` with no round trips.
    pub win_rate: Option<f64>,
    /// Gross profit over gross loss; `None` when gross loss is zero.
    pub profit_factor: Option<f64>,
}

impl TradeStats {
    pub fn compute(trips: &[RoundTrip]) -> Self {
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        let mut wins = 0;
        let mut losses = 0;
        for trip in trips {
            let p = trip.profit();
            // A flat round trip counts against the win rate.
            if p > 0.0 {
                wins += 1;
                gross_profit += p;
            } else {
                losses += 1;
                gross_loss += p;
            }
        }
        let win_rate = if trips.is_empty() {
            None
        } else {
            Some(wins as f64 / trips.len() as f64)
        };
        let profit_factor = if gross_loss == 0.0 {
            None
        } else {
            Some(-gross_profit / gross_loss)
        };
        Self {
            round_trips: trips.len(),
            wins,
            losses,
            win_rate,
            profit_factor,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────

/// Returns, equity curve and drawdown derived from the holdings totals.
#[derive(Debug, Clone, PartialEq)]
pub struct EquitySeries {
    /// One entry per holdings row; row 0 carries 0.0.
    pub returns: Vec<f64>,
    /// One entry per holdings row; row 0 is 1.0.
    pub equity_curve: Vec<f64>,
    pub drawdowns: Drawdowns,
}

impl EquitySeries {
    pub fn from_totals(totals: &[f64], seed: HwmSeed) -> Self {
        let period = period_returns(totals);
        let curve = equity_curve(&period);
        let drawdowns = drawdowns(&curve, seed);
        let mut returns = Vec::with_capacity(totals.len());
        if !totals.is_empty() {
            returns.push(0.0);
            returns.extend(period);
        }
        Self {
            returns,
            equity_curve: if totals.is_empty() { Vec::new() } else { curve },
            drawdowns,
        }
    }

    /// Realized period returns, excluding the initial row.
    pub fn realized_returns(&self) -> &[f64] {
        self.returns.get(1..).unwrap_or(&[])
    }
}

/// Final performance summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// First bar of the run (the row after the initial-capital snapshot).
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub periods: usize,
    pub total_return: f64,
    pub sharpe_annualized: f64,
    pub sharpe_per_period: f64,
    pub sortino_annualized: f64,
    pub sortino_per_period: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub calmar: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub drawdown_duration: usize,
    pub round_trips: usize,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
}

impl PerformanceReport {
    /// Compute the report.
    ///
    /// `timestamps` and `totals` have one entry per holdings row, row 0 being
    /// the initial-capital snapshot. `instrument_values` holds one marked-value
    /// column per instrument, each aligned with `totals`.
    pub fn compute(
        timestamps: &[NaiveDateTime],
        totals: &[f64],
        instrument_values: &[Vec<f64>],
        series: &EquitySeries,
        options: &ReportOptions,
    ) -> Self {
        let periods = options.periods.unwrap_or(totals.len());
        let returns = series.realized_returns();
        let (sharpe_annualized, sharpe_per_period) = sharpe(returns, periods);
        let (sortino_annualized, sortino_per_period) = sortino(returns, periods);
        let max_drawdown = series.drawdowns.max_drawdown;

        let start = timestamps.get(1).or(timestamps.first()).copied();
        let end = timestamps.last().copied();
        let days = match (start, end) {
            (Some(s), Some(e)) => (e - s).num_days(),
            _ => 0,
        };
        let cagr = match (totals.first(), totals.last()) {
            (Some(&first), Some(&last)) => cagr(first, last, days),
            _ => 0.0,
        };

        let trips: Vec<RoundTrip> = instrument_values
            .iter()
            .flat_map(|values| round_trips(values))
            .collect();
        let trade_stats = TradeStats::compute(&trips);

        Self {
            start,
            end,
            periods,
            total_return: series.equity_curve.last().map_or(0.0, |e| e - 1.0),
            sharpe_annualized,
            sharpe_per_period,
            sortino_annualized,
            sortino_per_period,
            skewness: skewness(returns),
            kurtosis: kurtosis(returns),
            calmar: calmar(returns, periods, max_drawdown),
            cagr,
            max_drawdown,
            drawdown_duration: series.drawdowns.max_duration,
            round_trips: trade_stats.round_trips,
            win_rate: trade_stats.win_rate,
            profit_factor: trade_stats.profit_factor,
        }
    }

    /// Human-readable key/value pairs, in report order.
    pub fn summary_lines(&self) -> Vec<(String, String)> {
        let optional = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |x| format!("{x:.2}"));
        let date = |d: Option<NaiveDateTime>| d.map_or_else(|| "N/A".to_string(), |x| x.to_string());
        vec![
            ("Start Date".into(), date(self.start)),
            ("End Date".into(), date(self.end)),
            ("Total Return".into(), format!("{:.2}%", self.total_return * 100.0)),
            ("Per-Period Sharpe Ratio".into(), format!("{:.4}", self.sharpe_per_period)),
            ("Per-Period Sortino Ratio".into(), format!("{:.4}", self.sortino_per_period)),
            ("Skewness".into(), format!("{:.3}", self.skewness)),
            ("Kurtosis".into(), format!("{:.3}", self.kurtosis)),
            ("Calmar Ratio".into(), format!("{:.6}", self.calmar)),
            ("CAGR".into(), format!("{:.5}%", self.cagr * 100.0)),
            ("Annualized Sharpe Ratio".into(), format!("{:.2}", self.sharpe_annualized)),
            ("Annualized Sortino Ratio".into(), format!("{:.2}", self.sortino_annualized)),
            ("Max Drawdown".into(), format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Drawdown Duration".into(), self.drawdown_duration.to_string()),
            ("Win Rate".into(), optional(self.win_rate)),
            ("Profit Factor".into(), optional(self.profit_factor)),
        ]
    }
}
