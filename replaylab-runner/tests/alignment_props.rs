//! Property tests for forward-fill alignment.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use replaylab_core::data::{HistoricalFeed, MarketDataFeed};
use replaylab_core::domain::Bar;
use replaylab_runner::data_loader::align_forward_fill;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, 1)
        .unwrap()
        .and_hms_opt(8, 45, 0)
        .unwrap()
}

/// Strictly increasing minute offsets with random gaps.
fn bars_strategy(symbol: &'static str) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((1i64..4, 1.0f64..1000.0), 1..40).prop_map(move |steps| {
        let mut minute = 0;
        steps
            .into_iter()
            .map(|(gap, price)| {
                minute += gap;
                Bar {
                    symbol: symbol.into(),
                    timestamp: base() + Duration::minutes(minute),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    adj_close: price,
                    volume: 1,
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn aligned_series_are_row_aligned(a in bars_strategy("A"), b in bars_strategy("B")) {
        let aligned = align_forward_fill(vec![("A".into(), a.clone()), ("B".into(), b.clone())]);
        let (ra, rb) = (&aligned[0].1, &aligned[1].1);
        prop_assert_eq!(ra.len(), rb.len());
        prop_assert!(!ra.is_empty());
        for (x, y) in ra.iter().zip(rb) {
            prop_assert_eq!(x.timestamp, y.timestamp);
        }
        // Timeline starts at the later first bar.
        let start = a[0].timestamp.max(b[0].timestamp);
        prop_assert_eq!(ra[0].timestamp, start);

        // The aligned output is always accepted by the historical feed.
        let feed = HistoricalFeed::new(aligned.clone());
        prop_assert!(feed.is_ok());
        let feed = feed.unwrap();
        prop_assert_eq!(feed.universe().len(), 2);
    }

    #[test]
    fn forward_fill_never_invents_prices(a in bars_strategy("A"), b in bars_strategy("B")) {
        let aligned = align_forward_fill(vec![("A".into(), a.clone()), ("B".into(), b)]);
        for bar in &aligned[0].1 {
            // Each aligned value is the last observed bar at or before its row.
            let source = a.iter().rev().find(|s| s.timestamp <= bar.timestamp);
            prop_assert!(source.is_some());
            prop_assert_eq!(source.unwrap().close, bar.close);
        }
    }
}
