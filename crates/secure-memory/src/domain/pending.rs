//! # Pending Authentication State
//!
//! Tracks everything in flight through the authentication pipeline.
//!
//! ## Structures
//!
//! - `tree`: addresses with an outstanding tree fetch (original data address
//!   and every node on its path), counted per address
//! - `hmac`: data addresses that are still owed a tag, counted per address
//! - `untrusted`: packets owned by the controller until their parent verifies
//!   (`AwaitingTree`) or their tag arrives (`AwaitingTag`)
//! - `tags`: the last tag seen per data address, kept while any access to the
//!   address is in flight
//!
//! Counts make the sets safe for concurrent accesses that share tree nodes or
//! target the same block: one arrival only retires one outstanding fetch.
//!
//! Children of any node occupy a single contiguous address range, so the
//! untrusted set is an ordered map and child lookup is a range query.

use std::collections::{BTreeMap, HashMap};

use shared_types::{Addr, AddrRange, Packet};

/// Why a packet is still held by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldStage {
    /// Parent tree node not yet verified.
    AwaitingTree,
    /// Tree path verified, tag still owed.
    AwaitingTag,
}

#[derive(Debug)]
struct HeldPacket {
    packet: Packet,
    stage: HoldStage,
}

/// The controller's pending sets.
#[derive(Debug, Default)]
pub struct PendingTracker {
    tree: BTreeMap<Addr, usize>,
    hmac: BTreeMap<Addr, usize>,
    untrusted: BTreeMap<Addr, Vec<HeldPacket>>,
    accesses: BTreeMap<Addr, usize>,
    tags: HashMap<Addr, Vec<u8>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Tree fetches
    // ---------------------------------------------------------------------

    /// Register one outstanding tree fetch for `addr`.
    pub fn expect_tree(&mut self, addr: Addr) {
        *self.tree.entry(addr).or_insert(0) += 1;
    }

    /// Retire one outstanding fetch for `addr`.
    ///
    /// Returns `false` if none was outstanding.
    pub fn resolve_tree(&mut self, addr: Addr) -> bool {
        decrement(&mut self.tree, addr)
    }

    pub fn is_tree_pending(&self, addr: Addr) -> bool {
        self.tree.contains_key(&addr)
    }

    // ---------------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------------

    /// Register one access to the data block at `addr`, which owes one tag.
    pub fn expect_hmac(&mut self, addr: Addr) {
        *self.hmac.entry(addr).or_insert(0) += 1;
        *self.accesses.entry(addr).or_insert(0) += 1;
    }

    pub fn is_hmac_pending(&self, addr: Addr) -> bool {
        self.hmac.contains_key(&addr)
    }

    /// Data addresses inside `coverage` that are owed a tag.
    pub fn hmac_waiters(&self, coverage: AddrRange) -> Vec<Addr> {
        self.hmac
            .range(coverage.start..coverage.end)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Deliver one tag for `addr`, remembering its bytes for verification.
    ///
    /// Returns `false` if no tag was owed.
    pub fn deliver_tag(&mut self, addr: Addr, tag: Option<Vec<u8>>) -> bool {
        if !decrement(&mut self.hmac, addr) {
            return false;
        }
        if let Some(tag) = tag {
            self.tags.insert(addr, tag);
        }
        true
    }

    /// The most recent tag delivered for `addr`.
    pub fn tag(&self, addr: Addr) -> Option<&[u8]> {
        self.tags.get(&addr).map(Vec::as_slice)
    }

    /// Retire one access to `addr`. The stored tag is dropped with the last.
    pub fn complete_access(&mut self, addr: Addr) -> bool {
        let retired = decrement(&mut self.accesses, addr);
        if !self.accesses.contains_key(&addr) {
            self.tags.remove(&addr);
        }
        retired
    }

    // ---------------------------------------------------------------------
    // Untrusted packets
    // ---------------------------------------------------------------------

    /// Take ownership of `packet` until it can be released.
    pub fn hold(&mut self, packet: Packet, stage: HoldStage) {
        self.untrusted
            .entry(packet.addr())
            .or_default()
            .push(HeldPacket { packet, stage });
    }

    /// True if any packet for `addr` is held.
    pub fn is_held(&self, addr: Addr) -> bool {
        self.untrusted.contains_key(&addr)
    }

    /// Remove every `AwaitingTree` packet whose address lies in `children`.
    pub fn take_children(&mut self, children: AddrRange) -> Vec<Packet> {
        let addrs: Vec<Addr> = self
            .untrusted
            .range(children.start..children.end)
            .map(|(addr, _)| *addr)
            .collect();

        let mut taken = Vec::new();
        for addr in addrs {
            taken.extend(self.take_where(addr, HoldStage::AwaitingTree, usize::MAX));
        }
        taken
    }

    /// Remove one `AwaitingTag` packet for `addr`, if any.
    pub fn take_awaiting_tag(&mut self, addr: Addr) -> Option<Packet> {
        self.take_where(addr, HoldStage::AwaitingTag, 1).pop()
    }

    fn take_where(&mut self, addr: Addr, stage: HoldStage, limit: usize) -> Vec<Packet> {
        let Some(held) = self.untrusted.get_mut(&addr) else {
            return Vec::new();
        };

        let mut taken = Vec::new();
        let mut index = 0;
        while index < held.len() && taken.len() < limit {
            if held[index].stage == stage {
                taken.push(held.remove(index).packet);
            } else {
                index += 1;
            }
        }

        if held.is_empty() {
            self.untrusted.remove(&addr);
        }
        taken
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Number of outstanding tree fetches.
    pub fn tree_len(&self) -> usize {
        self.tree.values().sum()
    }

    /// Number of owed tags.
    pub fn hmac_len(&self) -> usize {
        self.hmac.values().sum()
    }

    /// Number of held packets.
    pub fn held_len(&self) -> usize {
        self.untrusted.values().map(Vec::len).sum()
    }

    /// Number of held packets in `stage`.
    pub fn held_in_stage(&self, stage: HoldStage) -> usize {
        self.untrusted
            .values()
            .flatten()
            .filter(|held| held.stage == stage)
            .count()
    }

    /// Number of data accesses not yet completed.
    pub fn accesses_len(&self) -> usize {
        self.accesses.values().sum()
    }

    /// True when nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.tree.is_empty()
            && self.hmac.is_empty()
            && self.untrusted.is_empty()
            && self.accesses.is_empty()
            && self.tags.is_empty()
    }
}

fn decrement(counts: &mut BTreeMap<Addr, usize>, addr: Addr) -> bool {
    match counts.get_mut(&addr) {
        Some(count) if *count > 1 => {
            *count -= 1;
            true
        }
        Some(_) => {
            counts.remove(&addr);
            true
        }
        None => false,
    }
}
