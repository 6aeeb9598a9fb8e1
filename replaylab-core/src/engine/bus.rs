//! Event bus: driver-owned FIFO of typed events.

use std::collections::VecDeque;

use crate::domain::Event;

/// Single-consumer FIFO queue.
///
/// Producers borrow the bus mutably to publish; the driver is the only
/// consumer. Polling never blocks.
#[derive(Debug, Default, Clone)]
pub struct EventBus {
    queue: VecDeque<Event>,
    published: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the back of the queue.
    pub fn publish(&mut self, event: impl Into<Event>) {
        self.queue.push_back(event.into());
        self.published += 1;
    }

    /// Take the oldest event, or `None` when the queue is empty.
    pub fn poll(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total events ever published on this bus.
    pub fn published(&self) -> usize {
        self.published
    }
}
