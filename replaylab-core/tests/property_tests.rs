//! Property tests for ledger and analytics invariants.
//!
//! Uses proptest to verify:
//! 1. Equity identity: every holdings snapshot equals cash plus marked positions
//! 2. History length: one snapshot per bar plus the initial row
//! 3. Cash accounting: cash moves by exactly trade cost plus fee per fill
//! 4. Fee schedule: fees never drop below the fixed component and grow with size
//! 5. Drawdown: non-negative, and duration resets exactly when drawdown is zero

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use replaylab_core::analytics::{drawdowns, sharpe, HwmSeed};
use replaylab_core::components::{MovingAverageCross, MovingAverageCrossConfig};
use replaylab_core::data::{HistoricalFeed, MarketDataFeed};
use replaylab_core::domain::{Bar, InstrumentId, OrderEvent, OrderSide};
use replaylab_core::engine::{
    Backtest, DriverConfig, ExecutionConfig, FeeSchedule, PortfolioConfig, PortfolioLedger,
    SimulatedExecution,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_prices() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((100.0..20_000.0_f64).prop_map(|p| p.round()), 1..40)
}

fn arb_manual() -> impl Strategy<Value = Vec<Option<(bool, u64)>>> {
    prop::collection::vec(prop::option::of((any::<bool>(), 1..20u64)), 40)
}

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(i as i64)
}

fn backtest(prices: &[f64], short: usize, long: usize) -> Backtest {
    let bars = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Bar {
            symbol: "TXFC2".into(),
            timestamp: ts(i + 1),
            open: p,
            high: p,
            low: p,
            close: p,
            adj_close: p,
            volume: 1,
        })
        .collect();
    let feed = HistoricalFeed::new(vec![("TXFC2".into(), bars)]).unwrap();
    let universe = feed.universe().clone();
    let strategy = MovingAverageCross::new(
        &universe,
        MovingAverageCrossConfig {
            short_window: short,
            long_window: long,
            ..Default::default()
        },
    )
    .unwrap();
    let ledger = PortfolioLedger::new(&universe, &PortfolioConfig::default(), ts(0)).unwrap();
    let execution = SimulatedExecution::new(&universe, &ExecutionConfig::default()).unwrap();
    Backtest::new(
        Box::new(feed),
        Box::new(strategy),
        ledger,
        Box::new(execution),
        DriverConfig::default(),
    )
    .unwrap()
}

// ── 1-3. Ledger accounting ───────────────────────────────────────────

proptest! {
    /// The accounting identity holds at every snapshot, with manual orders mixed
    /// into the strategy's own flow.
    #[test]
    fn equity_identity_holds(
        prices in arb_prices(),
        manual in arb_manual(),
        short in 1..4usize,
        extra in 0..4usize,
    ) {
        let mut bt = backtest(&prices, short, short + extra);
        let mut step = 0;
        while bt.step().unwrap() {
            if let Some((buy, qty)) = manual[step] {
                let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
                let price = prices[step];
                bt.submit_order(OrderEvent::market(InstrumentId(0), price, qty, side));
                bt.drain().unwrap();
            }
            step += 1;
        }

        let holdings = bt.ledger().holdings();
        prop_assert_eq!(holdings.len(), prices.len() + 1);
        for h in holdings {
            let scale = h.cash.abs().max(1.0);
            prop_assert!(h.equity_drift().abs() <= scale * 1e-9, "drift {:?}", h);
        }
        prop_assert!(holdings.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    /// Cash changes by exactly `-(sign * price * qty + fee)` per fill.
    #[test]
    fn cash_tracks_fills(
        prices in arb_prices(),
        manual in arb_manual(),
    ) {
        // Equal windows never cross, so only manual orders trade.
        let mut bt = backtest(&prices, 1, 1);
        let schedule = FeeSchedule::taifex();
        let mut expected_cash = 5_000_000.0;
        let mut expected_position = 0i64;
        let mut step = 0;
        while bt.step().unwrap() {
            if let Some((buy, qty)) = manual[step] {
                let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
                let price = prices[step];
                bt.submit_order(OrderEvent::market(InstrumentId(0), price, qty, side));
                bt.drain().unwrap();
                let sign = side.sign();
                expected_cash -= sign as f64 * price * qty as f64
                    + schedule.trade_fee("TXFC2", price, qty);
                expected_position += sign * qty as i64;
            }
            step += 1;
        }
        let cash = bt.ledger().cash();
        prop_assert!((cash - expected_cash).abs() <= expected_cash.abs().max(1.0) * 1e-9);
        prop_assert_eq!(bt.ledger().position(InstrumentId(0)).unwrap(), expected_position);
        prop_assert_eq!(bt.stats().signals, 0);
    }
}

// ── 4. Fee schedule ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn fee_at_least_fixed_and_monotone(
        symbol in prop::sample::select(vec!["TXFC2", "MXFD1", "MTXE1", "TXO1700", "PUFF2", "QFFG2", "2330"]),
        price in 1.0..50_000.0_f64,
        qty in 1..500u64,
    ) {
        let schedule = FeeSchedule::taifex();
        let rule = schedule.rule_for(symbol);
        let fee = schedule.trade_fee(symbol, price, qty);
        prop_assert!(fee >= rule.fixed_fee);
        prop_assert!(schedule.trade_fee(symbol, price, qty + 1) > fee);
    }
}

// ── 5. Analytics ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drawdown_nonnegative_and_duration_resets(
        curve in prop::collection::vec(0.5..1.5_f64, 0..60),
        first in any::<bool>(),
    ) {
        let seed = if first { HwmSeed::FirstValue } else { HwmSeed::Zero };
        let dd = drawdowns(&curve, seed);
        prop_assert_eq!(dd.series.len(), curve.len());
        for t in 1..curve.len() {
            prop_assert!(dd.series[t] >= 0.0);
            if dd.series[t] == 0.0 {
                prop_assert_eq!(dd.durations[t], 0);
            } else {
                prop_assert_eq!(dd.durations[t], dd.durations[t - 1] + 1);
            }
        }
        prop_assert!(dd.durations.iter().all(|d| *d <= dd.max_duration));
    }

    #[test]
    fn sharpe_is_always_finite(returns in prop::collection::vec(-0.5..0.5_f64, 0..50)) {
        let (ann, per) = sharpe(&returns, 252);
        prop_assert!(ann.is_finite());
        prop_assert!(per.is_finite());
    }
}

#[test]
fn feed_reports_universe_size() {
    let bt = backtest(&[100.0, 101.0], 1, 2);
    assert_eq!(bt.feed().universe().len(), 1);
}
