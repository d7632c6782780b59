//! # Secure Memory Integrity Controller
//!
//! **Status:** Simulation model
//!
//! ## Purpose
//!
//! Sits between a requester and a memory device and transparently verifies
//! that every data block read from or written to memory has not been tampered
//! with. Each data block carries an HMAC tag, and its integrity is further
//! rooted in a counter tree whose root is trusted on arrival.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Tree levels strictly decrease from root to data | `domain/layout.rs` - `compute()` |
//! | Buffer occupancy plus reservations never exceeds capacity | `service/mod.rs` - `has_headroom()` |
//! | An access completes only after its tree path AND its tag | `service/response.rs` - `complete_data()` |
//! | A refused packet is re-sent exactly once | `adapters/port.rs` - `SidePort` |
//!
//! ## Address Space
//!
//! ```text
//! [0, data_end)          data region, advertised upstream
//! [data_end, counters)   HMAC array
//! [counters, ...)        counter nodes, then each tree level, then the root
//! ```
//!
//! ## Access Lifecycle
//!
//! ```text
//! recv_timing_req ──admit──▶ queue original + HMAC + tree path
//!                                     │
//!            ┌────────────────────────┴───────────────┐
//!            ▼                                        ▼
//!   tree nodes / data arrive                    HMAC block arrives
//!   (held until parent verified)                (tag recorded)
//!            │                                        │
//!            └──────────────── AND ──────────────────┘
//!                               ▼
//!                 read: verify tag, respond
//!                 write: commit to memory, respond on ack
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/port.rs - SidePort stash-and-retry flow control       │
//! │  service/         - SecureMemory state machine                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - SecureMemoryApi trait                      │
//! │  ports/outbound.rs - MemorySide, CpuSide traits                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/layout.rs      - IntegrityLayout                        │
//! │  domain/pending.rs     - PendingTracker                         │
//! │  domain/timed_queue.rs - TimedQueue                             │
//! │  domain/auth.rs        - Authenticator                          │
//! │  domain/events.rs      - EventSchedule                          │
//! │  domain/config.rs      - SecureMemoryConfig                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use secure_memory::{SecureMemory, SecureMemoryApi, SecureMemoryConfig};
//!
//! let mut controller = SecureMemory::new(SecureMemoryConfig::default(), memory, cpu)?;
//! let admission = controller.recv_timing_req(Packet::read(0x1000, 64), now)?;
//! while let Some(when) = controller.next_event_time() {
//!     controller.process_events(when)?;
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::SidePort;
pub use domain::{
    build_authenticator, Authenticator, AuthenticatorKind, HmacSha256Authenticator,
    IntegrityLayout, NullAuthenticator, SecureMemoryConfig,
};
pub use error::SecureMemoryError;
pub use metrics::SecureMemoryStats;
pub use ports::{Admission, CpuSide, MemorySide, SecureMemoryApi};
pub use service::SecureMemory;
