//! Criterion benchmarks for the replay hot path.
//!
//! Benchmarks:
//! 1. Full backtest run (feed advance + per-bar drain + report)
//! 2. Analytics over a long return series

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use replaylab_core::analytics::{drawdowns, equity_curve, kurtosis, sharpe, skewness, HwmSeed};
use replaylab_core::components::{MovingAverageCross, MovingAverageCrossConfig};
use replaylab_core::data::{HistoricalFeed, MarketDataFeed};
use replaylab_core::domain::Bar;
use replaylab_core::engine::{
    Backtest, DriverConfig, ExecutionConfig, PortfolioConfig, PortfolioLedger, SimulatedExecution,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(symbol: &str, n: usize, phase: f64) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(8, 45, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 16_000.0 + ((i as f64 * 0.05) + phase).sin() * 400.0;
            Bar {
                symbol: symbol.into(),
                timestamp: base + chrono::Duration::minutes(i as i64),
                open: close - 2.0,
                high: close + 5.0,
                low: close - 5.0,
                close,
                adj_close: close,
                volume: 1_000 + (i as u64 % 500),
            }
        })
        .collect()
}

fn make_backtest(n: usize) -> Backtest {
    let feed = HistoricalFeed::new(vec![
        ("TXFC2".into(), make_bars("TXFC2", n, 0.0)),
        ("MXFC2".into(), make_bars("MXFC2", n, 1.3)),
    ])
    .unwrap();
    let universe = feed.universe().clone();
    let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    Backtest::new(
        Box::new(feed),
        Box::new(MovingAverageCross::new(&universe, MovingAverageCrossConfig::default()).unwrap()),
        PortfolioLedger::new(&universe, &PortfolioConfig::default(), start).unwrap(),
        Box::new(SimulatedExecution::new(&universe, &ExecutionConfig::default()).unwrap()),
        DriverConfig::default(),
    )
    .unwrap()
}

// ── 1. Backtest run ──────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_run");
    for n in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || make_backtest(n),
                |mut bt| black_box(bt.run().unwrap()),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

// ── 2. Analytics ─────────────────────────────────────────────────────

fn bench_analytics(c: &mut Criterion) {
    let returns: Vec<f64> = (0..50_000)
        .map(|i| ((i as f64) * 0.37).sin() * 0.001)
        .collect();
    let curve = equity_curve(&returns);

    c.bench_function("analytics_50k", |b| {
        b.iter(|| {
            black_box(sharpe(black_box(&returns), 252));
            black_box(skewness(black_box(&returns)));
            black_box(kurtosis(black_box(&returns)));
            black_box(drawdowns(black_box(&curve), HwmSeed::Zero));
        })
    });
}

criterion_group!(benches, bench_backtest, bench_analytics);
criterion_main!(benches);
