//! Instrument fee schedule: fixed fee plus transaction tax, keyed by symbol prefix.
//!
//! `trade_fee = fixed_fee + price * quantity * contract_multiplier * tax_rate`
//!
//! New instrument families are new rows in the table; nothing else branches
//! on the symbol.

use serde::{Deserialize, Serialize};

/// One row of the fee table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRule {
    /// Symbol prefixes this row applies to. Empty for the default row.
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Flat brokerage fee per fill.
    pub fixed_fee: f64,
    /// Point value of one contract.
    pub contract_multiplier: f64,
    /// Transaction tax rate applied to the contract value.
    pub tax_rate: f64,
}

impl FeeRule {
    pub fn new(prefixes: &[&str], fixed_fee: f64, contract_multiplier: f64, tax_rate: f64) -> Self {
        Self {
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            fixed_fee,
            contract_multiplier,
            tax_rate,
        }
    }

    /// Tax component alone.
    pub fn tax(&self, price: f64, quantity: u64) -> f64 {
        price * quantity as f64 * self.contract_multiplier * self.tax_rate
    }

    /// Fixed fee plus tax for a fill of `quantity` at `price`.
    pub fn trade_fee(&self, price: f64, quantity: u64) -> f64 {
        self.fixed_fee + self.tax(price, quantity)
    }

    /// Length of the longest prefix of this row matching `symbol`.
    fn match_len(&self, symbol: &str) -> Option<usize> {
        self.prefixes
            .iter()
            .filter(|p| symbol.starts_with(p.as_str()))
            .map(|p| p.len())
            .max()
    }
}

/// Ordered fee table with a catch-all default row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rules: Vec<FeeRule>,
    pub default: FeeRule,
}

impl FeeSchedule {
    pub fn new(rules: Vec<FeeRule>, default: FeeRule) -> Self {
        Self { rules, default }
    }

    /// Taiwan futures exchange table: index futures, mini/micro futures,
    /// index options, and single-stock/ETF futures.
    pub fn taifex() -> Self {
        Self {
            rules: vec![
                FeeRule::new(&["TXF"], 100.0, 200.0, 0.00002),
                FeeRule::new(&["MX", "MTX"], 50.0, 50.0, 0.00002),
                FeeRule::new(&["TXO"], 50.0, 50.0, 0.001),
                FeeRule::new(&["PUF", "QFF"], 50.0, 100.0, 0.00002),
            ],
            default: FeeRule::new(&[], 50.0, 2000.0, 0.00002),
        }
    }

    /// Most specific matching row; the first row wins ties.
    pub fn rule_for(&self, symbol: &str) -> &FeeRule {
        let mut best: Option<(usize, &FeeRule)> = None;
        for rule in &self.rules {
            if let Some(len) = rule.match_len(symbol) {
                if best.map_or(true, |(best_len, _)| len > best_len) {
                    best = Some((len, rule));
                }
            }
        }
        best.map(|(_, rule)| rule).unwrap_or(&self.default)
    }

    /// Convenience: fee for a symbol without resolving the rule first.
    pub fn trade_fee(&self, symbol: &str, price: f64, quantity: u64) -> f64 {
        self.rule_for(symbol).trade_fee(price, quantity)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::taifex()
    }
}
