//! # Core Entities
//!
//! Memory-system packets and address ranges exchanged across the
//! requester ↔ controller ↔ memory boundaries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::errors::PacketError;

/// A physical byte address.
pub type Addr = u64;

/// Simulation time in ticks.
pub type Tick = u64;

/// A half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddrRange {
    /// First address in the range.
    pub start: Addr,
    /// One past the last address in the range.
    pub end: Addr,
}

impl AddrRange {
    /// Create a range covering `[start, end)`.
    pub fn new(start: Addr, end: Addr) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered.
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True if the range covers no address.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `addr` lies inside the range.
    pub fn contains(&self, addr: Addr) -> bool {
        addr >= self.start && addr < self.end
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}

/// Memory command carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemCmd {
    /// Read request travelling towards memory.
    ReadReq,
    /// Read response carrying data back.
    ReadResp,
    /// Write request carrying data towards memory.
    WriteReq,
    /// Write acknowledgement.
    WriteResp,
}

impl MemCmd {
    pub fn is_read(self) -> bool {
        matches!(self, Self::ReadReq | Self::ReadResp)
    }

    pub fn is_write(self) -> bool {
        matches!(self, Self::WriteReq | Self::WriteResp)
    }

    pub fn is_request(self) -> bool {
        matches!(self, Self::ReadReq | Self::WriteReq)
    }

    pub fn is_response(self) -> bool {
        !self.is_request()
    }

    /// The response command matching this request, `None` for responses.
    pub fn response_command(self) -> Option<MemCmd> {
        match self {
            Self::ReadReq => Some(Self::ReadResp),
            Self::WriteReq => Some(Self::WriteResp),
            Self::ReadResp | Self::WriteResp => None,
        }
    }
}

static NEXT_PACKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique packet identifier, used for tracing and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(u64);

impl PacketId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt#{}", self.0)
    }
}

/// A memory access in flight.
///
/// Not `Clone`: exactly one component owns a packet at any time, and
/// ownership moves with the value.
#[derive(Debug, PartialEq, Eq)]
pub struct Packet {
    id: PacketId,
    cmd: MemCmd,
    addr: Addr,
    size: usize,
    data: Option<Vec<u8>>,
}

impl Packet {
    /// Create a read request without a payload buffer.
    pub fn read(addr: Addr, size: usize) -> Self {
        Self {
            id: PacketId::next(),
            cmd: MemCmd::ReadReq,
            addr,
            size,
            data: None,
        }
    }

    /// Create a write request carrying `data`.
    pub fn write(addr: Addr, data: Vec<u8>) -> Self {
        Self {
            id: PacketId::next(),
            cmd: MemCmd::WriteReq,
            addr,
            size: data.len(),
            data: Some(data),
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn cmd(&self) -> MemCmd {
        self.cmd
    }

    pub fn addr(&self) -> Addr {
        self.addr
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_read(&self) -> bool {
        self.cmd.is_read()
    }

    pub fn is_write(&self) -> bool {
        self.cmd.is_write()
    }

    pub fn is_request(&self) -> bool {
        self.cmd.is_request()
    }

    pub fn is_response(&self) -> bool {
        self.cmd.is_response()
    }

    /// True if a payload buffer is attached.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// The attached payload, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Attach a zeroed payload buffer of `size` bytes.
    pub fn allocate(&mut self) {
        if self.data.is_none() {
            self.data = Some(vec![0; self.size]);
        }
    }

    /// Copy `bytes` into the payload, allocating it if needed.
    pub fn set_data(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() != self.size {
            return Err(PacketError::SizeMismatch {
                expected: self.size,
                actual: bytes.len(),
            });
        }
        self.data = Some(bytes.to_vec());
        Ok(())
    }

    /// Turn a request into its response in place.
    pub fn make_response(&mut self) -> Result<(), PacketError> {
        match self.cmd.response_command() {
            Some(cmd) => {
                self.cmd = cmd;
                Ok(())
            }
            None => Err(PacketError::NotARequest {
                addr: self.addr,
                cmd: self.cmd,
            }),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} [{:#x}:{:#x}]",
            self.id,
            self.cmd,
            self.addr,
            self.addr + self.size as u64
        )
    }
}
