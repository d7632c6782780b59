//! Stash-and-retry port
//!
//! Both sides of the controller share the same flow-control shape: a send
//! may be refused, the refused packet is stashed, and the far side later
//! signals a retry. `SidePort` wraps the far-side collaborator with that
//! state, so at most one packet per direction waits for a retry and it is
//! re-sent verbatim exactly once.

use shared_types::Packet;
use tracing::{debug, warn};

use crate::error::SecureMemoryError;
use crate::ports::{CpuSide, MemorySide};

type Offer<P> = fn(&mut P, Packet) -> Result<(), Packet>;

/// One side of the controller and its flow-control state.
pub struct SidePort<P> {
    name: &'static str,
    peer: P,
    offer: Offer<P>,
    stash: Option<Packet>,
    need_retry: bool,
}

impl<P: MemorySide> SidePort<P> {
    /// Request port towards the memory device.
    pub fn memory(peer: P) -> Self {
        Self::with_offer("mem_side", peer, P::try_send_timing_req)
    }
}

impl<P: CpuSide> SidePort<P> {
    /// Response port towards the requester.
    pub fn cpu(peer: P) -> Self {
        Self::with_offer("cpu_side", peer, P::try_send_timing_resp)
    }
}

impl<P> SidePort<P> {
    fn with_offer(name: &'static str, peer: P, offer: Offer<P>) -> Self {
        Self {
            name,
            peer,
            offer,
            stash: None,
            need_retry: false,
        }
    }

    /// A refused packet is waiting for the far side's retry.
    pub fn blocked(&self) -> bool {
        self.stash.is_some()
    }

    /// The far side was refused and is owed a retry notification.
    pub fn need_retry(&self) -> bool {
        self.need_retry
    }

    pub fn set_need_retry(&mut self) {
        self.need_retry = true;
    }

    pub fn clear_need_retry(&mut self) {
        self.need_retry = false;
    }

    /// Offer `pkt` to the far side, stashing it if refused.
    ///
    /// Returns `true` if the far side took the packet.
    pub fn send_packet(&mut self, pkt: Packet) -> Result<bool, SecureMemoryError> {
        if self.blocked() {
            return Err(SecureMemoryError::InvariantViolation(
                "send on a blocked port",
            ));
        }
        Ok(self.offer_or_stash(pkt))
    }

    /// The far side is ready again: re-send the stashed packet.
    ///
    /// Returns `true` if the port is now unblocked.
    pub fn recv_retry(&mut self) -> Result<bool, SecureMemoryError> {
        let Some(pkt) = self.stash.take() else {
            return Err(SecureMemoryError::ProtocolViolation(format!(
                "retry on {} while not blocked",
                self.name
            )));
        };
        debug!(port = self.name, pkt = %pkt, "Resending stashed packet");
        Ok(self.offer_or_stash(pkt))
    }

    fn offer_or_stash(&mut self, pkt: Packet) -> bool {
        match (self.offer)(&mut self.peer, pkt) {
            Ok(()) => true,
            Err(pkt) => {
                warn!(port = self.name, pkt = %pkt, "Far side refused packet, stashing");
                self.stash = Some(pkt);
                false
            }
        }
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    pub fn peer_mut(&mut self) -> &mut P {
        &mut self.peer
    }
}
