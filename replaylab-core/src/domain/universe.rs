//! Instrument universe: symbols resolved to dense ids once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Dense index of an instrument inside a [`Universe`].
///
/// All per-instrument state (positions, holdings, strategy state, feed
/// cursors) is stored in `Vec`s indexed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub usize);

impl InstrumentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The ordered set of tracked instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    symbols: Vec<String>,
    index: HashMap<String, InstrumentId>,
}

impl Universe {
    /// Build a universe from symbols in the given order. Duplicates are rejected.
    pub fn new<I, S>(symbols: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self {
            symbols: Vec::new(),
            index: HashMap::new(),
        };
        for symbol in symbols {
            let symbol = symbol.into();
            if out.index.contains_key(&symbol) {
                return Err(CoreError::InvalidConfig(format!(
                    "duplicate instrument '{symbol}'"
                )));
            }
            out.index
                .insert(symbol.clone(), InstrumentId(out.symbols.len()));
            out.symbols.push(symbol);
        }
        if out.symbols.is_empty() {
            return Err(CoreError::EmptyUniverse);
        }
        Ok(out)
    }

    /// Resolve a symbol to its id. Untracked symbols fail with `NotFound`.
    pub fn resolve(&self, symbol: &str) -> CoreResult<InstrumentId> {
        self.index
            .get(symbol)
            .copied()
            .ok_or_else(|| CoreError::NotFound {
                symbol: symbol.to_string(),
            })
    }

    /// Symbol for an id.
    pub fn symbol(&self, id: InstrumentId) -> CoreResult<&str> {
        self.symbols
            .get(id.0)
            .map(String::as_str)
            .ok_or(CoreError::UnknownInstrument(id))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Iterate `(id, symbol)` pairs in universe order.
    pub fn iter(&self) -> impl Iterator<Item = (InstrumentId, &str)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (InstrumentId(i), s.as_str()))
    }

    pub fn ids(&self) -> impl Iterator<Item = InstrumentId> {
        (0..self.symbols.len()).map(InstrumentId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_in_insertion_order() {
        let u = Universe::new(["TXFC2", "MXFC2"]).unwrap();
        assert_eq!(u.resolve("TXFC2").unwrap(), InstrumentId(0));
        assert_eq!(u.resolve("MXFC2").unwrap(), InstrumentId(1));
        assert_eq!(u.symbol(InstrumentId(1)).unwrap(), "MXFC2");
    }

    #[test]
    fn untracked_symbol_is_not_found() {
        let u = Universe::new(["TXFC2"]).unwrap();
        assert_eq!(
            u.resolve("SPY"),
            Err(CoreError::NotFound {
                symbol: "SPY".into()
            })
        );
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        let u = Universe::new(["TXFC2"]).unwrap();
        assert_eq!(
            u.symbol(InstrumentId(3)),
            Err(CoreError::UnknownInstrument(InstrumentId(3)))
        );
    }

    #[test]
    fn duplicates_and_empty_rejected() {
        assert!(Universe::new(["A", "A"]).is_err());
        assert_eq!(
            Universe::new(Vec::<String>::new()),
            Err(CoreError::EmptyUniverse)
        );
    }
}
