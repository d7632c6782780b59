//! # Error Types
//!
//! Errors raised by packet manipulation.

use thiserror::Error;

use crate::entities::{Addr, MemCmd};

/// Errors that can occur when turning packets around or filling payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Only requests can be turned into responses.
    #[error("Packet for {addr:#x} is not a request (cmd={cmd:?})")]
    NotARequest { addr: Addr, cmd: MemCmd },

    /// Payload length does not match the packet size.
    #[error("Payload of {actual} bytes does not fit packet of {expected} bytes")]
    SizeMismatch { expected: usize, actual: usize },
}
