//! # Shared Types Crate
//!
//! Packet model shared by the secure-memory controller and the components that
//! sit on either side of it (requesters, memory devices, the simulation host).
//!
//! ## Design Principles
//!
//! - **Single owner per packet**: `Packet` is deliberately not `Clone`. A packet
//!   moves between its owner locations (caller, pending sets, buffers, port
//!   stashes) and is dropped exactly once.
//! - **Explicit time**: `Tick` values are always passed in by the caller; there
//!   is no ambient simulation clock.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
