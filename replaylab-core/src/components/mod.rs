//! Pluggable components consumed by the driver.

pub mod strategy;

pub use strategy::{MarketState, MovingAverageCross, MovingAverageCrossConfig, Strategy};
