//! Self-scheduling controller events
//!
//! Each event has at most one pending instance, like a clocked object's
//! event wrapper: scheduling an already scheduled event is a no-op.

use shared_types::Tick;

/// Internal events driven by the host clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControllerEvent {
    /// Drain the head of the outbound-to-memory buffer.
    ReqSend,
    /// Drain the head of the outbound-to-processor buffer.
    RespSend,
    /// Tell the requester it may resend a refused access.
    ReqRetry,
}

const ALL_EVENTS: [ControllerEvent; 3] = [
    ControllerEvent::ReqSend,
    ControllerEvent::RespSend,
    ControllerEvent::ReqRetry,
];

/// Pending times of the controller events.
#[derive(Debug, Default)]
pub struct EventSchedule {
    slots: [Option<Tick>; 3],
}

impl EventSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(event: ControllerEvent) -> usize {
        match event {
            ControllerEvent::ReqSend => 0,
            ControllerEvent::RespSend => 1,
            ControllerEvent::ReqRetry => 2,
        }
    }

    pub fn is_scheduled(&self, event: ControllerEvent) -> bool {
        self.slots[Self::slot(event)].is_some()
    }

    pub fn when(&self, event: ControllerEvent) -> Option<Tick> {
        self.slots[Self::slot(event)]
    }

    /// Schedule `event` at `when` unless it is already pending.
    ///
    /// Returns whether the event was scheduled by this call.
    pub fn schedule(&mut self, event: ControllerEvent, when: Tick) -> bool {
        let slot = &mut self.slots[Self::slot(event)];
        if slot.is_some() {
            return false;
        }
        *slot = Some(when);
        true
    }

    /// Earliest pending event time.
    pub fn next_time(&self) -> Option<Tick> {
        self.slots.iter().flatten().copied().min()
    }

    /// Remove and return the earliest event due at or before `now`.
    ///
    /// Same-tick events fire in declaration order.
    pub fn pop_due(&mut self, now: Tick) -> Option<(ControllerEvent, Tick)> {
        let (event, when) = ALL_EVENTS
            .iter()
            .filter_map(|&event| self.when(event).map(|when| (event, when)))
            .filter(|&(_, when)| when <= now)
            .min_by_key(|&(event, when)| (when, event))?;
        self.slots[Self::slot(event)] = None;
        Some((event, when))
    }
}

/// The first clock edge strictly after `now`.
pub fn next_cycle(now: Tick, period: Tick) -> Tick {
    (now / period + 1) * period
}
