//! Response path: tree verification and the tag/tree AND-join.
//!
//! A data access completes once both its tree path has verified and its tag
//! has arrived, in either order. Tree nodes that arrive before their parent
//! verified wait in the untrusted set; the root is trusted on arrival and
//! releases the waiting subtree top-down.

use shared_types::{Addr, Packet, Tick};
use tracing::{debug, instrument, warn};

use super::SecureMemory;
use crate::domain::HoldStage;
use crate::error::SecureMemoryError;
use crate::ports::{CpuSide, MemorySide};

impl<M: MemorySide, C: CpuSide> SecureMemory<M, C> {
    #[instrument(skip(self, pkt), fields(pkt = %pkt))]
    pub(super) fn handle_timing_resp(
        &mut self,
        pkt: Packet,
        now: Tick,
    ) -> Result<(), SecureMemoryError> {
        if !pkt.is_response() {
            return Err(SecureMemoryError::ProtocolViolation(format!(
                "expected a response from memory, got {pkt}"
            )));
        }

        let addr = pkt.addr();
        if pkt.is_write() {
            if !self.layout.is_data(addr) {
                return Err(SecureMemoryError::ProtocolViolation(format!(
                    "write acknowledgement {pkt} outside data region"
                )));
            }
            debug!("Write committed, acknowledging requester");
            return self.push_response(pkt, now);
        }

        if self.layout.is_hmac(addr) {
            return self.handle_hmac(pkt, now);
        }

        if self.layout.level_of(addr).is_none() {
            return Err(SecureMemoryError::ProtocolViolation(format!(
                "response {pkt} maps to no integrity level"
            )));
        }

        if !self.pending.resolve_tree(addr) {
            warn!("Response with no outstanding fetch, dropping");
            return Ok(());
        }

        if self.layout.is_root(addr) {
            debug!("Root node arrived");
            return self.verify_from(pkt, now);
        }

        let Some(parent) = self.layout.parent_addr(addr) else {
            return Err(SecureMemoryError::InvariantViolation(
                "non-root tree address without a parent",
            ));
        };

        if self.pending.is_tree_pending(parent) || self.pending.is_held(parent) {
            debug!(parent = %format_args!("{parent:#x}"), "Parent unverified, holding");
            self.pending.hold(pkt, HoldStage::AwaitingTree);
            Ok(())
        } else {
            self.verify_from(pkt, now)
        }
    }

    /// Deliver the tags of an HMAC block to every access waiting on it.
    fn handle_hmac(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        self.stats.hmacs_received += 1;

        let Some(coverage) = self.layout.hmac_coverage(pkt.addr()) else {
            return Err(SecureMemoryError::InvariantViolation(
                "HMAC address without coverage",
            ));
        };

        let waiters = self.pending.hmac_waiters(coverage);
        if waiters.is_empty() {
            warn!("HMAC block matches no pending access, dropping");
            return Ok(());
        }

        let tag_size = self.config.hmac_size as usize;
        for addr in waiters {
            let offset = self.layout.hmac_tag_offset(addr);
            let tag = pkt
                .data()
                .and_then(|data| data.get(offset..offset + tag_size))
                .map(<[u8]>::to_vec);
            self.pending.deliver_tag(addr, tag);

            for released in self.release_tag_waiters(addr) {
                debug!(addr = %format_args!("{addr:#x}"), "Tag arrived after tree path");
                self.finish_access(released, now)?;
            }
        }
        Ok(())
    }

    /// Packets for `addr` whose tree path verified and whose tag is now in.
    ///
    /// With more tags still owed for the same block only one packet is
    /// released; the last tag releases the rest.
    fn release_tag_waiters(&mut self, addr: Addr) -> Vec<Packet> {
        if self.pending.is_hmac_pending(addr) {
            return self.pending.take_awaiting_tag(addr).into_iter().collect();
        }
        std::iter::from_fn(|| self.pending.take_awaiting_tag(addr)).collect()
    }

    /// Verify `start` and everything waiting beneath it.
    fn verify_from(&mut self, start: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        let mut work = vec![start];

        while let Some(pkt) = work.pop() {
            let addr = pkt.addr();

            if self.layout.is_data(addr) {
                self.complete_data(pkt, now)?;
                continue;
            }

            if let Some(children) = self.layout.children_range(addr) {
                let released = self.pending.take_children(children);
                debug!(
                    node = %format_args!("{addr:#x}"),
                    children = released.len(),
                    "Tree node verified"
                );
                work.extend(released);
            }
        }
        Ok(())
    }

    /// The tree path of a data packet has verified.
    fn complete_data(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        if self.pending.is_hmac_pending(pkt.addr()) {
            debug!(
                addr = %format_args!("{:#x}", pkt.addr()),
                "Tree path verified, tag still owed"
            );
            self.pending.hold(pkt, HoldStage::AwaitingTag);
            return Ok(());
        }
        self.finish_access(pkt, now)
    }

    /// Both the tree path and the tag are in: release the access.
    fn finish_access(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        let addr = pkt.addr();

        if pkt.is_write() {
            self.pending.resolve_tree(addr);
            self.pending.complete_access(addr);
            self.reserved_inspection = self.reserved_inspection.checked_sub(1).ok_or(
                SecureMemoryError::InvariantViolation("write commit without a reserved slot"),
            )?;
            self.push_inspection(pkt, now)?;
            self.stats.accesses_verified += 1;
            debug!(addr = %format_args!("{addr:#x}"), "Write authenticated, committing");
            self.schedule_req_send(now);
            return Ok(());
        }

        let authentic = self.authenticator.verify(
            addr,
            pkt.data().unwrap_or_default(),
            self.pending.tag(addr).unwrap_or_default(),
        );
        self.pending.complete_access(addr);
        if !authentic {
            warn!(addr = %format_args!("{addr:#x}"), "Tag mismatch");
            return Err(SecureMemoryError::IntegrityViolation { addr });
        }

        self.stats.accesses_verified += 1;
        debug!(addr = %format_args!("{addr:#x}"), "Read authenticated");
        self.push_response(pkt, now)
    }
}
