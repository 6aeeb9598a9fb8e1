//! Structured error types for the replay core.

use thiserror::Error;

use crate::domain::InstrumentId;

/// Errors surfaced by the replay core.
///
/// Feed exhaustion during a normal run is not an error: the driver observes
/// `has_more() == false` and finishes. `EndOfFeed` is only produced when a
/// caller advances an instrument that has nothing left.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("instrument '{symbol}' is not tracked by this universe")]
    NotFound { symbol: String },

    #[error("instrument id {0} is outside the universe")]
    UnknownInstrument(InstrumentId),

    #[error("no bars have been advanced to for '{symbol}'")]
    NoBars { symbol: String },

    #[error("feed exhausted for '{symbol}'")]
    EndOfFeed { symbol: String },

    #[error("feed is not time-aligned: {symbol} row {row} is {found}, expected {expected}")]
    Misaligned {
        symbol: String,
        row: usize,
        expected: String,
        found: String,
    },

    #[error("universe must contain at least one instrument")]
    EmptyUniverse,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
