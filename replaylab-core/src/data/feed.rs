//! Market data feed: the narrow bar interface the core consumes.
//!
//! The feed exposes one "latest" row of bars at a time. Accessors only read
//! bars that have already been advanced to, so nothing downstream can observe
//! a future bar.

use chrono::NaiveDateTime;

use crate::domain::{Bar, BarField, InstrumentId, Universe};
use crate::error::{CoreError, CoreResult};

/// Contract for a historical (or live) bar source.
///
/// Bars across instruments are assumed time-aligned by the data collaborator
/// before they reach the feed.
pub trait MarketDataFeed {
    /// The instruments this feed serves.
    fn universe(&self) -> &Universe;

    /// Whether `id` has another bar to advance to.
    fn has_more_for(&self, id: InstrumentId) -> CoreResult<bool>;

    /// Make the next bar of `id` visible and return it.
    ///
    /// Fails with `EndOfFeed` when the instrument is exhausted.
    fn advance(&mut self, id: InstrumentId) -> CoreResult<&Bar>;

    /// The last `n` visible bars of `id` (fewer if fewer are available).
    fn latest_bars(&self, id: InstrumentId, n: usize) -> CoreResult<&[Bar]>;

    /// Timestamp of the next bar `advance` would reveal for `id`, without
    /// revealing it. `None` once the instrument is exhausted.
    fn peek_timestamp(&self, id: InstrumentId) -> CoreResult<Option<NaiveDateTime>>;

    /// Whether every tracked instrument has another bar.
    fn has_more(&self) -> bool {
        self.universe()
            .ids()
            .all(|id| self.has_more_for(id).unwrap_or(false))
    }

    /// Advance every tracked instrument by one bar.
    fn advance_all(&mut self) -> CoreResult<()> {
        let ids: Vec<InstrumentId> = self.universe().ids().collect();
        for id in ids {
            self.advance(id)?;
        }
        Ok(())
    }

    /// The most recent visible bar of `id`.
    fn latest_bar(&self, id: InstrumentId) -> CoreResult<&Bar> {
        match self.latest_bars(id, 1)?.last() {
            Some(bar) => Ok(bar),
            None => Err(CoreError::NoBars {
                symbol: self.universe().symbol(id)?.to_string(),
            }),
        }
    }

    /// A single field of the most recent visible bar.
    fn latest_value(&self, id: InstrumentId, field: BarField) -> CoreResult<f64> {
        Ok(self.latest_bar(id)?.value(field))
    }

    /// A field over the last `n` visible bars, oldest first.
    fn latest_values(&self, id: InstrumentId, field: BarField, n: usize) -> CoreResult<Vec<f64>> {
        Ok(self
            .latest_bars(id, n)?
            .iter()
            .map(|bar| bar.value(field))
            .collect())
    }

    /// Timestamp of the most recent visible bar.
    fn latest_timestamp(&self, id: InstrumentId) -> CoreResult<NaiveDateTime> {
        Ok(self.latest_bar(id)?.timestamp)
    }

    /// Symbol-keyed variant of [`latest_values`](Self::latest_values).
    fn latest_values_by_symbol(&self, symbol: &str, field: BarField, n: usize) -> CoreResult<Vec<f64>> {
        let id = self.universe().resolve(symbol)?;
        self.latest_values(id, field, n)
    }
}

/// In-memory replay of pre-loaded, time-aligned bars.
#[derive(Debug, Clone)]
pub struct HistoricalFeed {
    universe: Universe,
    bars: Vec<Vec<Bar>>,
    /// Number of bars already made visible, per instrument.
    cursor: Vec<usize>,
}

impl HistoricalFeed {
    /// Build a feed from `(symbol, bars)` pairs in universe order.
    ///
    /// Every instrument must carry the same number of bars, row `i` must share
    /// one timestamp across instruments, and timestamps must strictly increase.
    pub fn new(series: Vec<(String, Vec<Bar>)>) -> CoreResult<Self> {
        let universe = Universe::new(series.iter().map(|(s, _)| s.clone()))?;
        let bars: Vec<Vec<Bar>> = series.into_iter().map(|(_, b)| b).collect();

        let reference = &bars[0];
        for (i, w) in reference.windows(2).enumerate() {
            if w[1].timestamp <= w[0].timestamp {
                return Err(CoreError::Misaligned {
                    symbol: universe.symbols()[0].clone(),
                    row: i + 1,
                    expected: format!("after {}", w[0].timestamp),
                    found: w[1].timestamp.to_string(),
                });
            }
        }

        for (idx, series) in bars.iter().enumerate().skip(1) {
            let symbol = &universe.symbols()[idx];
            if series.len() != reference.len() {
                let row = series.len().min(reference.len());
                return Err(CoreError::Misaligned {
                    symbol: symbol.clone(),
                    row,
                    expected: format!("{} bars", reference.len()),
                    found: format!("{} bars", series.len()),
                });
            }
            for (row, (bar, ref_bar)) in series.iter().zip(reference).enumerate() {
                if bar.timestamp != ref_bar.timestamp {
                    return Err(CoreError::Misaligned {
                        symbol: symbol.clone(),
                        row,
                        expected: ref_bar.timestamp.to_string(),
                        found: bar.timestamp.to_string(),
                    });
                }
            }
        }

        let cursor = vec![0; bars.len()];
        Ok(Self {
            universe,
            bars,
            cursor,
        })
    }

    /// Total bars per instrument.
    pub fn len(&self) -> usize {
        self.bars.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bars already made visible (taken from the first instrument).
    pub fn position(&self) -> usize {
        self.cursor.first().copied().unwrap_or(0)
    }

    fn slot(&self, id: InstrumentId) -> CoreResult<usize> {
        if id.index() < self.bars.len() {
            Ok(id.index())
        } else {
            Err(CoreError::UnknownInstrument(id))
        }
    }
}

impl MarketDataFeed for HistoricalFeed {
    fn universe(&self) -> &Universe {
        &self.universe
    }

    fn has_more_for(&self, id: InstrumentId) -> CoreResult<bool> {
        let i = self.slot(id)?;
        Ok(self.cursor[i] < self.bars[i].len())
    }

    fn advance(&mut self, id: InstrumentId) -> CoreResult<&Bar> {
        let i = self.slot(id)?;
        if self.cursor[i] >= self.bars[i].len() {
            return Err(CoreError::EndOfFeed {
                symbol: self.universe.symbols()[i].clone(),
            });
        }
        self.cursor[i] += 1;
        Ok(&self.bars[i][self.cursor[i] - 1])
    }

    fn latest_bars(&self, id: InstrumentId, n: usize) -> CoreResult<&[Bar]> {
        let i = self.slot(id)?;
        let end = self.cursor[i];
        let start = end.saturating_sub(n);
        Ok(&self.bars[i][start..end])
    }

    fn peek_timestamp(&self, id: InstrumentId) -> CoreResult<Option<NaiveDateTime>> {
        let i = self.slot(id)?;
        Ok(self.bars[i].get(self.cursor[i]).map(|bar| bar.timestamp))
    }
}
