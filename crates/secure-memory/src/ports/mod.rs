//! Ports layer for the secure memory controller.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) port: API exposed to the host simulation
//! - Outbound (Driven) ports: the memory device and the requester

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
