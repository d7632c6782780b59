//! Discrete event host for the secure memory controller.
//!
//! Interleaves host events (requester issues, memory responses, retries)
//! with the controller's own scheduled events, always running whichever is
//! due first. Controller events win ties so a buffer drains before new
//! traffic lands on the same tick.

use std::collections::{BinaryHeap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use secure_memory::{
    Admission, SecureMemory, SecureMemoryApi, SecureMemoryConfig, SecureMemoryError,
};
use shared_types::{AddrRange, Packet, Tick};
use tracing::debug;

use super::device::{SimCpu, SimMemory};
use super::event::{HostEvent, ScheduledEvent};

pub type SimController = SecureMemory<SimMemory, SimCpu>;

/// Host simulation around one controller.
pub struct SecureMemorySim {
    controller: SimController,
    now: Tick,
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    rng: StdRng,
    min_latency: Tick,
    max_latency: Tick,
    cpu_retry_delay: Tick,
    /// Requests refused by the controller, oldest first.
    parked: VecDeque<Packet>,
    completed: Vec<(Tick, Packet)>,
}

impl SecureMemorySim {
    /// Simulate a controller over `range` with the default devices.
    pub fn new(
        range: AddrRange,
        config: SecureMemoryConfig,
        seed: u64,
    ) -> Result<Self, SecureMemoryError> {
        let memory = SimMemory::new(range, &config)?;
        Self::with_devices(config, memory, SimCpu::new(), seed)
    }

    pub fn with_devices(
        config: SecureMemoryConfig,
        memory: SimMemory,
        cpu: SimCpu,
        seed: u64,
    ) -> Result<Self, SecureMemoryError> {
        Ok(Self {
            controller: SecureMemory::new(config, memory, cpu)?,
            now: 0,
            queue: BinaryHeap::new(),
            next_seq: 0,
            rng: StdRng::seed_from_u64(seed),
            min_latency: 10_000,
            max_latency: 50_000,
            cpu_retry_delay: 3_000,
            parked: VecDeque::new(),
            completed: Vec::new(),
        })
    }

    /// Memory latency is drawn uniformly from `[min, max]` per request.
    pub fn with_memory_latency(mut self, min: Tick, max: Tick) -> Self {
        self.min_latency = min;
        self.max_latency = max.max(min);
        self
    }

    pub fn controller(&self) -> &SimController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SimController {
        &mut self.controller
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Responses delivered to the requester, with delivery time.
    pub fn completed(&self) -> &[(Tick, Packet)] {
        &self.completed
    }

    /// Requests still waiting for a retry from the controller.
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    /// Nothing left to do anywhere.
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty() && self.parked.is_empty() && self.controller.is_drained()
    }

    /// The requester issues `pkt` at `time`.
    pub fn issue_at(&mut self, time: Tick, pkt: Packet) {
        self.schedule(time, HostEvent::Issue(pkt));
    }

    fn schedule(&mut self, time: Tick, event: HostEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent { time, seq, event });
    }

    /// Run until no host or controller event remains.
    pub fn run(&mut self) -> Result<(), SecureMemoryError> {
        while self.step()? {}
        Ok(())
    }

    /// Execute the earliest pending event. Returns `false` once idle.
    pub fn step(&mut self) -> Result<bool, SecureMemoryError> {
        let host = self.queue.peek().map(|e| e.time);
        let controller = self.controller.next_event_time();

        match (host, controller) {
            (None, None) => return Ok(false),
            (Some(h), Some(c)) if c <= h => self.tick_controller(c)?,
            (None, Some(c)) => self.tick_controller(c)?,
            _ => {
                if let Some(next) = self.queue.pop() {
                    self.now = self.now.max(next.time);
                    self.process(next.event)?;
                }
            }
        }

        self.collect()?;
        Ok(true)
    }

    fn tick_controller(&mut self, when: Tick) -> Result<(), SecureMemoryError> {
        self.now = self.now.max(when);
        self.controller.process_events(self.now)
    }

    fn process(&mut self, event: HostEvent) -> Result<(), SecureMemoryError> {
        match event {
            HostEvent::Issue(pkt) => {
                if self.parked.is_empty() {
                    self.offer(pkt)?;
                } else {
                    self.parked.push_back(pkt);
                }
            }
            HostEvent::MemoryResponse(pkt) => {
                let resp = self.controller.memory_mut().serve(pkt);
                self.controller.recv_timing_resp(resp, self.now)?;
            }
            HostEvent::MemoryRetry => self.controller.recv_req_retry(self.now)?,
            HostEvent::CpuRetry => self.controller.recv_resp_retry(self.now)?,
        }
        Ok(())
    }

    /// Offer a request; returns `false` and parks it if refused.
    fn offer(&mut self, pkt: Packet) -> Result<bool, SecureMemoryError> {
        match self.controller.recv_timing_req(pkt, self.now)? {
            Admission::Accepted => Ok(true),
            Admission::Retry(pkt) => {
                debug!(pkt = %pkt, now = self.now, "Controller busy, parking request");
                self.parked.push_front(pkt);
                Ok(false)
            }
        }
    }

    /// React to whatever the devices observed during the last step.
    fn collect(&mut self) -> Result<(), SecureMemoryError> {
        for pkt in self.controller.memory_mut().take_accepted() {
            let latency = self.rng.gen_range(self.min_latency..=self.max_latency);
            self.schedule(self.now + latency, HostEvent::MemoryResponse(pkt));
        }

        if self.controller.memory_mut().take_retry() {
            self.schedule(self.now, HostEvent::MemoryRetry);
        }

        if self.controller.cpu_mut().take_owed_retry() {
            self.schedule(self.now + self.cpu_retry_delay, HostEvent::CpuRetry);
        }

        if self.controller.cpu_mut().take_retry_grant() {
            while let Some(pkt) = self.parked.pop_front() {
                if !self.offer(pkt)? {
                    break;
                }
            }
        }

        let now = self.now;
        self.completed.extend(
            self.controller
                .cpu_mut()
                .take_received()
                .into_iter()
                .map(|pkt| (now, pkt)),
        );
        Ok(())
    }
}
