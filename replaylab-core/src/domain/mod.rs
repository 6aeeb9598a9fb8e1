//! Domain types for the replay core.

pub mod bar;
pub mod event;
pub mod fill;
pub mod order;
pub mod signal;
pub mod universe;

pub use bar::{Bar, BarField};
pub use event::{Event, EventKind};
pub use fill::FillEvent;
pub use order::{OrderEvent, OrderKind, OrderSide};
pub use signal::{SignalDirection, SignalEvent};
pub use universe::{InstrumentId, Universe};
