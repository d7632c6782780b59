//! Outbound (Driven) ports for the secure memory controller.
//!
//! These traits define the far ends of the two port pairs: the memory device
//! below the controller and the requester above it.

use shared_types::{AddrRange, Packet, Tick};

/// The memory device behind the controller.
///
/// Responses from the device are always accepted: every access reserves its
/// outbound and response slots at admission, so there is no response retry
/// toward memory.
pub trait MemorySide {
    /// The full device range, data and metadata halves together.
    fn addr_range(&self) -> AddrRange;

    /// Offer a timing request. A refused packet is handed back and the
    /// device later calls `recv_req_retry` on the controller.
    fn try_send_timing_req(&mut self, pkt: Packet) -> Result<(), Packet>;

    /// Untimed access.
    fn send_functional(&mut self, pkt: &mut Packet);

    /// Atomic access; returns the device latency.
    fn send_atomic(&mut self, pkt: &mut Packet) -> Tick;
}

/// The requester in front of the controller.
pub trait CpuSide {
    /// Offer a timing response. A refused packet is handed back and the
    /// requester later calls `recv_resp_retry` on the controller.
    fn try_send_timing_resp(&mut self, pkt: Packet) -> Result<(), Packet>;

    /// Tell the requester it may resend a refused request.
    fn send_retry_req(&mut self);
}

/// Mock memory device for testing. Records every request it accepts.
#[cfg(test)]
pub struct MockMemory {
    pub range: AddrRange,
    pub sent: Vec<Packet>,
    /// Number of upcoming timing requests to refuse.
    pub refuse: usize,
    pub atomic_latency: Tick,
    pub functional_calls: usize,
}

#[cfg(test)]
impl MockMemory {
    pub fn new(range: AddrRange) -> Self {
        Self {
            range,
            sent: Vec::new(),
            refuse: 0,
            atomic_latency: 50,
            functional_calls: 0,
        }
    }

    /// Remove the oldest accepted request.
    pub fn take_sent(&mut self) -> Option<Packet> {
        if self.sent.is_empty() {
            None
        } else {
            Some(self.sent.remove(0))
        }
    }
}

#[cfg(test)]
impl MemorySide for MockMemory {
    fn addr_range(&self) -> AddrRange {
        self.range
    }

    fn try_send_timing_req(&mut self, pkt: Packet) -> Result<(), Packet> {
        if self.refuse > 0 {
            self.refuse -= 1;
            return Err(pkt);
        }
        self.sent.push(pkt);
        Ok(())
    }

    fn send_functional(&mut self, pkt: &mut Packet) {
        self.functional_calls += 1;
        if pkt.is_read() {
            pkt.allocate();
        }
        let _ = pkt.make_response();
    }

    fn send_atomic(&mut self, pkt: &mut Packet) -> Tick {
        let _ = pkt.make_response();
        self.atomic_latency
    }
}

/// Mock requester for testing. Records every response it accepts.
#[cfg(test)]
#[derive(Default)]
pub struct MockCpu {
    pub received: Vec<Packet>,
    /// Refuse every response while set.
    pub refuse: bool,
    pub retry_req_calls: usize,
}

#[cfg(test)]
impl MockCpu {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl CpuSide for MockCpu {
    fn try_send_timing_resp(&mut self, pkt: Packet) -> Result<(), Packet> {
        if self.refuse {
            return Err(pkt);
        }
        self.received.push(pkt);
        Ok(())
    }

    fn send_retry_req(&mut self) {
        self.retry_req_calls += 1;
    }
}
