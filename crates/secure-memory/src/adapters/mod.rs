//! Adapters layer for the secure memory controller.
//!
//! Wraps the outbound port collaborators with stash-and-retry flow control.

pub mod port;

pub use port::SidePort;
