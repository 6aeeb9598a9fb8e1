//! The typed event union carried by the bus.

use serde::{Deserialize, Serialize};

use super::fill::FillEvent;
use super::order::OrderEvent;
use super::signal::SignalEvent;

/// Every message that can travel through the event bus.
///
/// `Market` carries no payload: it only announces that the feed made a new
/// row of bars visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Market,
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    /// Short label used in logs and diagnostics.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Market => EventKind::Market,
            Event::Signal(_) => EventKind::Signal,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
        }
    }
}

/// Discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Market,
    Signal,
    Order,
    Fill,
}

impl From<SignalEvent> for Event {
    fn from(signal: SignalEvent) -> Self {
        Event::Signal(signal)
    }
}

impl From<OrderEvent> for Event {
    fn from(order: OrderEvent) -> Self {
        Event::Order(order)
    }
}

impl From<FillEvent> for Event {
    fn from(fill: FillEvent) -> Self {
        Event::Fill(fill)
    }
}
