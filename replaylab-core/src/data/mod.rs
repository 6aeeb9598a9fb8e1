//! Market data feed contract and the in-memory historical implementation.

pub mod feed;

pub use feed::{HistoricalFeed, MarketDataFeed};
