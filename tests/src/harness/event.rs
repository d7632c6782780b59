//! Host events and their priority queue ordering.

use std::cmp::Ordering;

use shared_types::{Packet, Tick};

/// Events the host simulation delivers to the controller.
#[derive(Debug)]
pub enum HostEvent {
    /// The requester issues an access.
    Issue(Packet),
    /// The memory device finishes serving this request and responds.
    MemoryResponse(Packet),
    /// The memory device can take the request it refused.
    MemoryRetry,
    /// The requester can take the response it refused.
    CpuRetry,
}

/// A host event with its delivery time.
#[derive(Debug)]
pub struct ScheduledEvent {
    pub time: Tick,
    /// Insertion order, for deterministic same-tick delivery.
    pub seq: u64,
    pub event: HostEvent,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn test_earliest_then_first_inserted() {
        let mut heap = BinaryHeap::new();
        heap.push(ScheduledEvent {
            time: 10,
            seq: 0,
            event: HostEvent::MemoryRetry,
        });
        heap.push(ScheduledEvent {
            time: 5,
            seq: 2,
            event: HostEvent::CpuRetry,
        });
        heap.push(ScheduledEvent {
            time: 5,
            seq: 1,
            event: HostEvent::MemoryRetry,
        });

        let order: Vec<(Tick, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|e| (e.time, e.seq))
            .collect();
        assert_eq!(order, vec![(5, 1), (5, 2), (10, 0)]);
    }
}
