//! # Inbound Port - SecureMemoryApi
//!
//! Primary driving port through which the host simulation delivers packets,
//! retry notifications and clock ticks to the controller.
//!
//! | Method | Caller |
//! |--------|--------|
//! | `recv_timing_req` | Requester (CPU side) |
//! | `recv_resp_retry` | Requester (CPU side) |
//! | `recv_functional` / `recv_atomic` | Requester (CPU side) |
//! | `get_addr_ranges` | Requester (CPU side) |
//! | `recv_timing_resp` | Memory device |
//! | `recv_req_retry` | Memory device |
//! | `process_events` / `next_event_time` | Host clock |

use shared_types::{AddrRange, Packet, Tick};

use crate::error::SecureMemoryError;

/// Outcome of offering a timing request to the controller.
#[derive(Debug)]
#[must_use]
pub enum Admission {
    /// The controller took ownership of the packet.
    Accepted,
    /// No room right now. The packet is handed back and the requester will
    /// be notified through `send_retry_req` once space frees up.
    Retry(Packet),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Primary API of the secure memory controller.
///
/// The controller is single-threaded and run-to-completion. The caller passes
/// the current tick explicitly to every timed operation.
///
/// # Example
///
/// ```rust,ignore
/// use secure_memory::ports::{Admission, SecureMemoryApi};
///
/// match controller.recv_timing_req(Packet::read(0x1000, 64), now)? {
///     Admission::Accepted => {}
///     Admission::Retry(pkt) => park_until_retry(pkt),
/// }
/// while let Some(when) = controller.next_event_time() {
///     controller.process_events(when)?;
/// }
/// ```
pub trait SecureMemoryApi {
    /// Offer a data-region request from the requester.
    ///
    /// # Errors
    /// - `ProtocolViolation`: not a request, or outside the data region
    fn recv_timing_req(&mut self, pkt: Packet, now: Tick) -> Result<Admission, SecureMemoryError>;

    /// Deliver a response from the memory device. Always accepted.
    ///
    /// # Errors
    /// - `ProtocolViolation`: not a response, or an unknown address
    /// - `IntegrityViolation`: a read block failed tag verification
    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError>;

    /// The memory device can accept the previously refused request.
    fn recv_req_retry(&mut self, now: Tick) -> Result<(), SecureMemoryError>;

    /// The requester can accept the previously refused response.
    fn recv_resp_retry(&mut self, now: Tick) -> Result<(), SecureMemoryError>;

    /// Untimed access, forwarded to the memory device unchanged.
    fn recv_functional(&mut self, pkt: &mut Packet);

    /// Atomic access; returns the total latency in ticks.
    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick;

    /// Address ranges visible to the requester.
    fn get_addr_ranges(&self) -> Vec<AddrRange>;

    /// Run every internal event due at or before `now`, in time order.
    fn process_events(&mut self, now: Tick) -> Result<(), SecureMemoryError>;

    /// When the host must next call `process_events`.
    fn next_event_time(&self) -> Option<Tick>;
}
