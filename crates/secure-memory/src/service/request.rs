//! Request path: admission control and metadata fan-out.

use std::iter;

use shared_types::{Packet, Tick};
use tracing::{debug, instrument, warn};

use super::SecureMemory;
use crate::domain::HoldStage;
use crate::error::SecureMemoryError;
use crate::ports::{Admission, CpuSide, MemorySide};

impl<M: MemorySide, C: CpuSide> SecureMemory<M, C> {
    #[instrument(skip(self, pkt), fields(pkt = %pkt))]
    pub(super) fn handle_timing_req(
        &mut self,
        pkt: Packet,
        now: Tick,
    ) -> Result<Admission, SecureMemoryError> {
        if !pkt.is_request() {
            return Err(SecureMemoryError::ProtocolViolation(format!(
                "expected a request from the requester, got {pkt}"
            )));
        }
        if !self.layout.is_data(pkt.addr()) {
            return Err(SecureMemoryError::ProtocolViolation(format!(
                "request {pkt} outside data region {}",
                self.layout.data_range()
            )));
        }
        if pkt.is_write() && !pkt.has_data() {
            return Err(SecureMemoryError::ProtocolViolation(format!(
                "write {pkt} carries no data"
            )));
        }

        if !self.has_headroom() {
            warn!(
                inspection = self.inspection.len(),
                reserved = self.reserved_inspection,
                responses = self.responses.len(),
                "No room for access, requester must retry"
            );
            self.stats.requests_rejected += 1;
            self.cpu_port.set_need_retry();
            let next = self.next_cycle(now);
            self.schedule_req_retry(next);
            return Ok(Admission::Retry(pkt));
        }

        self.handle_request(pkt, now)?;
        Ok(Admission::Accepted)
    }

    /// Queue the access and every metadata read needed to authenticate it.
    fn handle_request(&mut self, pkt: Packet, now: Tick) -> Result<(), SecureMemoryError> {
        let addr = pkt.addr();
        let hmac_addr = self.layout.hmac_addr(addr).ok_or_else(|| {
            SecureMemoryError::ProtocolViolation(format!("no HMAC entry for {addr:#x}"))
        })?;
        let chain = self.layout.auth_chain(addr);

        self.pending.expect_tree(addr);
        self.pending.expect_hmac(addr);
        self.reserved_responses += 1;

        if pkt.is_write() {
            // Held until its path verifies, then committed into this slot.
            self.reserved_inspection += 1;
            self.pending.hold(pkt, HoldStage::AwaitingTree);
        } else {
            self.push_inspection(pkt, now)?;
        }

        let block_size = self.layout.block_size() as usize;
        for (offset, meta) in (1..).zip(iter::once(hmac_addr).chain(chain.iter().copied())) {
            if meta != hmac_addr {
                self.pending.expect_tree(meta);
            }
            self.push_inspection(Packet::read(meta, block_size), now + offset)?;
            self.stats.metadata_fetches += 1;
        }

        debug!(
            addr = %format_args!("{addr:#x}"),
            hmac = %format_args!("{hmac_addr:#x}"),
            depth = chain.len(),
            inspection = self.inspection.len(),
            "Access admitted"
        );

        self.schedule_req_send(now);
        Ok(())
    }
}
