//! Controller statistics
//!
//! Plain counters updated by the service as packets leave the buffers and
//! move through the authentication pipeline. Consumers read a snapshot via
//! `SecureMemory::stats()`.

use serde::Serialize;
use shared_types::Tick;

/// Secure memory controller statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SecureMemoryStats {
    /// Ticks packets spent in the outbound-to-memory buffer.
    pub total_buffer_latency: Tick,
    /// Packets handed to the memory device.
    pub requests_forwarded: u64,
    /// Ticks packets spent in the outbound-to-processor buffer.
    pub total_response_buffer_latency: Tick,
    /// Packets handed to the requester.
    pub responses_forwarded: u64,
    /// Requests refused by admission control.
    pub requests_rejected: u64,
    /// Metadata reads (tags and tree nodes) issued.
    pub metadata_fetches: u64,
    /// HMAC blocks received from memory.
    pub hmacs_received: u64,
    /// Data accesses that completed authentication.
    pub accesses_verified: u64,
    /// Retry notifications sent to the requester.
    pub retries_sent: u64,
}

impl SecureMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a packet leaving the outbound-to-memory buffer.
    pub fn record_request_forwarded(&mut self, queued: Tick) {
        self.total_buffer_latency += queued;
        self.requests_forwarded += 1;
    }

    /// Record a packet leaving the outbound-to-processor buffer.
    pub fn record_response_forwarded(&mut self, queued: Tick) {
        self.total_response_buffer_latency += queued;
        self.responses_forwarded += 1;
    }

    /// Mean ticks per forwarded request, zero before the first one.
    pub fn avg_buffer_latency(&self) -> f64 {
        average(self.total_buffer_latency, self.requests_forwarded)
    }

    /// Mean ticks per forwarded response, zero before the first one.
    pub fn avg_response_buffer_latency(&self) -> f64 {
        average(self.total_response_buffer_latency, self.responses_forwarded)
    }
}

fn average(total: Tick, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
