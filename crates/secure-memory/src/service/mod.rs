//! # Secure Memory Service
//!
//! The controller state machine. Implements [`SecureMemoryApi`] on top of
//! the domain layer and the two [`SidePort`]s.
//!
//! ## Buffers
//!
//! ```text
//!   requester ──req──▶ [ handle_request ] ──▶ inspection ──ReqSend──▶ memory
//!   requester ◀──resp── responses ◀──RespSend── [ verify ] ◀──resp── memory
//! ```
//!
//! Admission reserves every buffer slot an access will ever need, so an
//! admitted access can never overflow either buffer.

mod request;
mod response;


use shared_types::{Addr, AddrRange, Packet, Tick};
use tracing::{debug, info, instrument};

use crate::adapters::SidePort;
use crate::domain::{
    build_authenticator, next_cycle, Authenticator, ControllerEvent, EventSchedule,
    IntegrityLayout, PendingTracker, SecureMemoryConfig, TimedQueue,
};
use crate::error::SecureMemoryError;
use crate::metrics::SecureMemoryStats;
use crate::ports::{Admission, CpuSide, MemorySide, SecureMemoryApi};

/// The secure memory controller.
pub struct SecureMemory<M: MemorySide, C: CpuSide> {
    config: SecureMemoryConfig,
    layout: IntegrityLayout,
    authenticator: Box<dyn Authenticator>,
    mem_port: SidePort<M>,
    cpu_port: SidePort<C>,
    /// Outbound to memory.
    inspection: TimedQueue<Packet>,
    /// Outbound to the requester.
    responses: TimedQueue<Packet>,
    /// Inspection slots held for write commits.
    reserved_inspection: usize,
    /// Response slots held for admitted accesses.
    reserved_responses: usize,
    pending: PendingTracker,
    events: EventSchedule,
    stats: SecureMemoryStats,
}

impl<M: MemorySide, C: CpuSide> SecureMemory<M, C> {
    /// Build a controller in front of `memory`.
    ///
    /// # Errors
    /// - `Configuration`: invalid parameters, a device range that cannot
    ///   host the metadata, or an inspection buffer too small for one access
    pub fn new(config: SecureMemoryConfig, memory: M, cpu: C) -> Result<Self, SecureMemoryError> {
        config.validate()?;
        let layout = IntegrityLayout::from_config(memory.addr_range(), &config)?;

        let per_access = Self::slots_per_access(&layout);
        if config.inspection_buffer_entries < per_access {
            return Err(SecureMemoryError::Configuration(format!(
                "inspection buffer holds {} entries, one access needs {}",
                config.inspection_buffer_entries, per_access
            )));
        }

        info!(
            device = %layout.device_range(),
            data = %layout.data_range(),
            depth = layout.depth(),
            root = %format_args!("{:#x}", layout.root_addr()),
            "Secure memory layout computed"
        );

        let authenticator =
            build_authenticator(&config.authenticator, config.hmac_size as usize)?;

        Ok(Self {
            inspection: TimedQueue::new(config.clock_period),
            responses: TimedQueue::new(config.clock_period),
            config,
            layout,
            authenticator,
            mem_port: SidePort::memory(memory),
            cpu_port: SidePort::cpu(cpu),
            reserved_inspection: 0,
            reserved_responses: 0,
            pending: PendingTracker::new(),
            events: EventSchedule::new(),
            stats: SecureMemoryStats::new(),
        })
    }

    /// Original (or its write commit) + HMAC + every tree node on the path.
    fn slots_per_access(layout: &IntegrityLayout) -> usize {
        2 + layout.depth()
    }

    pub fn config(&self) -> &SecureMemoryConfig {
        &self.config
    }

    pub fn layout(&self) -> &IntegrityLayout {
        &self.layout
    }

    pub fn stats(&self) -> SecureMemoryStats {
        self.stats.clone()
    }

    pub fn pending(&self) -> &PendingTracker {
        &self.pending
    }

    pub fn memory(&self) -> &M {
        self.mem_port.peer()
    }

    pub fn memory_mut(&mut self) -> &mut M {
        self.mem_port.peer_mut()
    }

    pub fn cpu(&self) -> &C {
        self.cpu_port.peer()
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        self.cpu_port.peer_mut()
    }

    /// Entries waiting to go to memory.
    pub fn inspection_len(&self) -> usize {
        self.inspection.len()
    }

    /// Entries waiting to go to the requester.
    pub fn response_len(&self) -> usize {
        self.responses.len()
    }

    /// Addresses queued towards memory, head first.
    pub fn inspection_addrs(&self) -> Vec<Addr> {
        self.inspection.iter().map(Packet::addr).collect()
    }

    /// True when no access is in flight and both buffers are drained.
    pub fn is_drained(&self) -> bool {
        self.pending.is_idle()
            && self.inspection.is_empty()
            && self.responses.is_empty()
            && !self.mem_port.blocked()
            && !self.cpu_port.blocked()
    }

    // ---------------------------------------------------------------------
    // Buffer bookkeeping
    // ---------------------------------------------------------------------

    /// Room for one more access in both buffers, and a free response path.
    fn has_headroom(&self) -> bool {
        let inspection_used = self.inspection.len() + self.reserved_inspection;
        let responses_used = self.responses.len() + self.reserved_responses;

        !self.cpu_port.blocked()
            && inspection_used + Self::slots_per_access(&self.layout)
                <= self.config.inspection_buffer_entries
            && responses_used < self.config.response_buffer_entries
    }

    fn push_inspection(&mut self, pkt: Packet, when: Tick) -> Result<(), SecureMemoryError> {
        let len = self.inspection.len() + self.reserved_inspection;
        if len >= self.config.inspection_buffer_entries {
            return Err(SecureMemoryError::CapacityViolation {
                buffer: "inspection",
                len,
                capacity: self.config.inspection_buffer_entries,
            });
        }
        self.inspection.push(pkt, when);
        Ok(())
    }

    /// Push a reply into the slot reserved when its access was admitted.
    fn push_response(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        self.reserved_responses = self
            .reserved_responses
            .checked_sub(1)
            .ok_or(SecureMemoryError::InvariantViolation(
                "response without a reserved slot",
            ))?;

        let len = self.responses.len() + self.reserved_responses;
        if len >= self.config.response_buffer_entries {
            return Err(SecureMemoryError::CapacityViolation {
                buffer: "response",
                len,
                capacity: self.config.response_buffer_entries,
            });
        }
        self.responses.push(pkt, now);
        self.schedule_resp_send(now);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Event scheduling
    // ---------------------------------------------------------------------

    fn schedule_req_send(&mut self, now: Tick) {
        if self.mem_port.blocked() {
            return;
        }
        if let Some(ready) = self.inspection.first_ready_time() {
            self.events.schedule(ControllerEvent::ReqSend, ready.max(now));
        }
    }

    fn schedule_resp_send(&mut self, now: Tick) {
        if self.cpu_port.blocked() {
            return;
        }
        if let Some(ready) = self.responses.first_ready_time() {
            self.events.schedule(ControllerEvent::RespSend, ready.max(now));
        }
    }

    fn schedule_req_retry(&mut self, when: Tick) {
        if self.cpu_port.need_retry() {
            self.events.schedule(ControllerEvent::ReqRetry, when);
        }
    }

    fn next_cycle(&self, now: Tick) -> Tick {
        next_cycle(now, self.config.clock_period)
    }

    fn process_req_send(&mut self, now: Tick) -> Result<(), SecureMemoryError> {
        if self.mem_port.blocked() {
            return Ok(());
        }
        if !self.inspection.has_ready(now) {
            self.schedule_req_send(now);
            return Ok(());
        }

        let queued = self
            .inspection
            .front_time()
            .map_or(0, |inserted| now.saturating_sub(inserted));
        let Some(pkt) = self.inspection.pop() else {
            return Ok(());
        };

        debug!(pkt = %pkt, queued, "Forwarding request to memory");
        self.stats.record_request_forwarded(queued);
        self.mem_port.send_packet(pkt)?;

        let next = self.next_cycle(now);
        self.schedule_req_retry(next);
        self.schedule_req_send(next);
        Ok(())
    }

    fn process_resp_send(&mut self, now: Tick) -> Result<(), SecureMemoryError> {
        if self.cpu_port.blocked() {
            return Ok(());
        }
        if !self.responses.has_ready(now) {
            self.schedule_resp_send(now);
            return Ok(());
        }

        let queued = self
            .responses
            .front_time()
            .map_or(0, |inserted| now.saturating_sub(inserted));
        let Some(pkt) = self.responses.pop() else {
            return Ok(());
        };

        debug!(pkt = %pkt, queued, "Forwarding response to requester");
        self.stats.record_response_forwarded(queued);
        self.cpu_port.send_packet(pkt)?;

        let next = self.next_cycle(now);
        self.schedule_req_retry(next);
        self.schedule_resp_send(next);
        Ok(())
    }

    fn process_req_retry(&mut self) {
        if self.cpu_port.need_retry() && !self.mem_port.blocked() && self.has_headroom() {
            debug!("Signalling requester to retry");
            self.cpu_port.clear_need_retry();
            self.stats.retries_sent += 1;
            self.cpu_port.peer_mut().send_retry_req();
        }
    }
}

impl<M: MemorySide, C: CpuSide> SecureMemoryApi for SecureMemory<M, C> {
    fn recv_timing_req(&mut self, pkt: Packet, now: Tick) -> Result<Admission, SecureMemoryError> {
        self.handle_timing_req(pkt, now)
    }

    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        self.handle_timing_resp(pkt, now)
    }

    #[instrument(skip(self))]
    fn recv_req_retry(&mut self, now: Tick) -> Result<(), SecureMemoryError> {
        if self.mem_port.recv_retry()? {
            self.schedule_req_send(now);
            let next = self.next_cycle(now);
            self.schedule_req_retry(next);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn recv_resp_retry(&mut self, now: Tick) -> Result<(), SecureMemoryError> {
        if self.cpu_port.recv_retry()? {
            self.schedule_resp_send(now);
            let next = self.next_cycle(now);
            self.schedule_req_retry(next);
        }
        Ok(())
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        self.mem_port.peer_mut().send_functional(pkt);
    }

    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick {
        self.config.clock_period + self.mem_port.peer_mut().send_atomic(pkt)
    }

    fn get_addr_ranges(&self) -> Vec<AddrRange> {
        vec![self.layout.data_range()]
    }

    fn process_events(&mut self, now: Tick) -> Result<(), SecureMemoryError> {
        while let Some((event, when)) = self.events.pop_due(now) {
            match event {
                ControllerEvent::ReqSend => self.process_req_send(when)?,
                ControllerEvent::RespSend => self.process_resp_send(when)?,
                ControllerEvent::ReqRetry => self.process_req_retry(),
            }
        }
        Ok(())
    }

    fn next_event_time(&self) -> Option<Tick> {
        self.events.next_time()
    }
}
