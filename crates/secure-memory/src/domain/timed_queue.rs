//! Fixed-latency FIFO
//!
//! Models a pipeline stage: an item becomes ready `latency` ticks after it
//! was admitted. Readiness is a function of the head only; items are never
//! reordered.

use std::collections::VecDeque;

use shared_types::Tick;

/// FIFO queue whose head becomes ready after a fixed latency.
#[derive(Debug)]
pub struct TimedQueue<T> {
    latency: Tick,
    items: VecDeque<(T, Tick)>,
}

impl<T> TimedQueue<T> {
    pub fn new(latency: Tick) -> Self {
        Self {
            latency,
            items: VecDeque::new(),
        }
    }

    pub fn latency(&self) -> Tick {
        self.latency
    }

    /// Append `item`, admitted at `insertion_time`.
    pub fn push(&mut self, item: T, insertion_time: Tick) {
        self.items.push_back((item, insertion_time));
    }

    /// Remove and return the head.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front().map(|(item, _)| item)
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front().map(|(item, _)| item)
    }

    /// Admission time of the head.
    pub fn front_time(&self) -> Option<Tick> {
        self.items.front().map(|(_, time)| *time)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True iff the head has waited at least `latency` ticks by `now`.
    pub fn has_ready(&self, now: Tick) -> bool {
        match self.front_time() {
            Some(inserted) => now.saturating_sub(inserted) >= self.latency && now >= inserted,
            None => false,
        }
    }

    /// Tick at which the head becomes ready.
    pub fn first_ready_time(&self) -> Option<Tick> {
        self.front_time().map(|inserted| inserted + self.latency)
    }

    /// Iterate items from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|(item, _)| item)
    }
}
