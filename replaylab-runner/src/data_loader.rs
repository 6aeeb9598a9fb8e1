//! Bar loading and alignment for the runner.
//!
//! Each symbol is read from `<data_dir>/<symbol>.csv`. The fallback policy:
//! 1. If the CSV file exists → parse it
//! 2. If not and `synthetic` is enabled → generate synthetic bars (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! After loading, every symbol is aligned onto the union of all timestamps
//! with forward fill, so the historical feed sees equal-length, row-aligned
//! series. Synthetic data is a developer-only debug mode.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use replaylab_core::domain::Bar;

use crate::config::parse_timestamp;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data file for '{symbol}' at {path} (enable synthetic data to generate bars)")]
    MissingData { symbol: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}, row {row}: unrecognized timestamp '{value}'")]
    BadTimestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("{path}, row {row}: non-finite price")]
    BadPrice { path: PathBuf, row: usize },

    #[error("no bars for '{symbol}' after {start}")]
    NoBarsAfterStart { symbol: String, start: NaiveDateTime },
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Directory holding one `<symbol>.csv` per instrument.
    pub data_dir: PathBuf,
    /// Bars at or before this timestamp are dropped; the ledger's initial
    /// snapshot occupies it.
    pub start: NaiveDateTime,
    /// If true, generate synthetic bars when no CSV exists.
    pub synthetic: bool,
    /// Number of synthetic bars per symbol.
    pub synthetic_bars: usize,
}

/// Where a symbol's bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Synthetic,
}

/// Result of loading bars, including data source provenance.
#[derive(Debug)]
pub struct LoadedData {
    /// Aligned bars per symbol, in the requested symbol order.
    pub series: Vec<(String, Vec<Bar>)>,
    pub sources: HashMap<String, DataSource>,
    /// BLAKE3 over all aligned bar data.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedData {
    /// Number of aligned rows (identical for every symbol).
    pub fn rows(&self) -> usize {
        self.series.first().map_or(0, |(_, bars)| bars.len())
    }
}

/// One CSV record. `adj_close` falls back to `close` when absent.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Datetime", alias = "Date", alias = "date", alias = "timestamp")]
    datetime: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(default, alias = "Adj Close", alias = "adj close")]
    adj_close: Option<f64>,
    #[serde(default, alias = "Volume")]
    volume: f64,
}

/// Load bars for every symbol and align them onto a common timeline.
pub fn load_bars(symbols: &[String], opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let mut raw = Vec::with_capacity(symbols.len());
    let mut sources = HashMap::new();
    let mut has_synthetic = false;

    for symbol in symbols {
        let path = opts.data_dir.join(format!("{symbol}.csv"));
        let bars = if path.is_file() {
            let bars = parse_csv(symbol, &path)?;
            debug!(%symbol, path = %path.display(), bars = bars.len(), "loaded csv");
            sources.insert(symbol.clone(), DataSource::Csv);
            bars
        } else if opts.synthetic {
            warn!(%symbol, "no data file; generating synthetic bars, results are tagged synthetic");
            has_synthetic = true;
            sources.insert(symbol.clone(), DataSource::Synthetic);
            generate_synthetic_bars(symbol, opts.start, opts.synthetic_bars)
        } else {
            return Err(LoadError::MissingData {
                symbol: symbol.clone(),
                path,
            });
        };

        let bars = normalize(bars, opts.start);
        if bars.is_empty() {
            return Err(LoadError::NoBarsAfterStart {
                symbol: symbol.clone(),
                start: opts.start,
            });
        }
        raw.push((symbol.clone(), bars));
    }

    let series = align_forward_fill(raw);
    let dataset_hash = compute_dataset_hash(&series);
    let rows = series.first().map_or(0, |(_, bars)| bars.len());
    info!(symbols = series.len(), rows, has_synthetic, "bars loaded");

    Ok(LoadedData {
        series,
        sources,
        dataset_hash,
        has_synthetic,
    })
}

/// Parse one symbol's CSV file.
pub fn parse_csv(symbol: &str, path: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let row = i + 2;
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let timestamp =
            parse_timestamp(&record.datetime).ok_or_else(|| LoadError::BadTimestamp {
                path: path.to_path_buf(),
                row,
                value: record.datetime.clone(),
            })?;
        let adj_close = record.adj_close.unwrap_or(record.close);
        let prices = [record.open, record.high, record.low, record.close, adj_close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(LoadError::BadPrice {
                path: path.to_path_buf(),
                row,
            });
        }
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            adj_close,
            volume: record.volume.max(0.0).round() as u64,
        });
    }
    Ok(bars)
}

/// Sort by time, drop duplicate timestamps (first wins) and bars at or before `start`.
fn normalize(mut bars: Vec<Bar>, start: NaiveDateTime) -> Vec<Bar> {
    bars.retain(|b| b.timestamp > start);
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}

/// Align every series onto the union timeline, padding gaps with the last
/// seen bar. Timestamps before the latest first-bar are dropped so no
/// series needs a value it has not observed yet.
pub fn align_forward_fill(series: Vec<(String, Vec<Bar>)>) -> Vec<(String, Vec<Bar>)> {
    let Some(common_start) = series
        .iter()
        .filter_map(|(_, bars)| bars.first().map(|b| b.timestamp))
        .max()
    else {
        return series;
    };

    let timeline: BTreeSet<NaiveDateTime> = series
        .iter()
        .flat_map(|(_, bars)| bars.iter().map(|b| b.timestamp))
        .filter(|ts| *ts >= common_start)
        .collect();

    series
        .into_iter()
        .map(|(symbol, bars)| {
            let mut out = Vec::with_capacity(timeline.len());
            let mut cursor = 0;
            let mut last: Option<&Bar> = None;
            for &ts in &timeline {
                while cursor < bars.len() && bars[cursor].timestamp <= ts {
                    last = Some(&bars[cursor]);
                    cursor += 1;
                }
                if let Some(prev) = last {
                    let mut bar = prev.clone();
                    bar.timestamp = ts;
                    out.push(bar);
                }
            }
            (symbol, out)
        })
        .collect()
}

/// Compute a deterministic BLAKE3 hash over all bar data, in symbol order.
pub fn compute_dataset_hash(series: &[(String, Vec<Bar>)]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, bars) in series {
        hasher.update(symbol.as_bytes());
        for bar in bars {
            hasher.update(bar.timestamp.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.adj_close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate `count` one-minute synthetic bars starting one minute after `start`.
///
/// A random walk from 15,000 seeded by the symbol name, so every run over the
/// same symbol sees the same prices.
pub fn generate_synthetic_bars(symbol: &str, start: NaiveDateTime, count: usize) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut price = 15_000.0_f64;
    let mut bars = Vec::with_capacity(count);
    for i in 0..count {
        let step: f64 = rng.gen_range(-0.002..0.002);
        let open = price;
        let close = price * (1.0 + step);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.0005));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.0005));
        let volume = rng.gen_range(100..5_000u64);

        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: start + Duration::minutes(i as i64 + 1),
            open,
            high,
            low,
            close,
            adj_close: close,
            volume,
        });
        price = close;
    }
    bars
}
