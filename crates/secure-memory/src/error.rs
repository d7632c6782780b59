//! Error types for the secure memory controller
//!
//! Every variant is fatal for the simulation. Momentary backpressure is not an
//! error: it is reported as [`Admission::Retry`](crate::ports::Admission) and
//! absorbed by the port stash-and-retry mechanism.

use shared_types::{Addr, PacketError};
use thiserror::Error;

/// Errors that can occur in the secure memory controller
#[derive(Debug, Error)]
pub enum SecureMemoryError {
    /// Invalid parameters or an address range that cannot host the metadata.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A buffer would exceed its declared capacity.
    #[error("Capacity violation: {buffer} buffer holds {len} of {capacity} entries")]
    CapacityViolation {
        buffer: &'static str,
        len: usize,
        capacity: usize,
    },

    /// A collaborator broke the port contract.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A data block failed tag verification.
    #[error("Integrity violation: tag mismatch for block {addr:#x}")]
    IntegrityViolation { addr: Addr },

    /// Internal state machine assertion.
    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}

impl SecureMemoryError {
    /// True for errors caused by the setup collaborator.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
