//! # Domain Layer - Secure Memory Controller
//!
//! Pure logic, no collaborators.
//!
//! ## Components
//!
//! - `config`: `SecureMemoryConfig` and validation
//! - `layout`: `IntegrityLayout`, address partitioning and tree navigation
//! - `timed_queue`: `TimedQueue`, fixed-latency FIFO
//! - `pending`: `PendingTracker`, in-flight authentication state
//! - `auth`: tag primitives
//! - `events`: self-scheduling controller events

pub mod auth;
pub mod config;
pub mod events;
pub mod layout;
pub mod pending;
pub mod timed_queue;

pub use auth::{
    build_authenticator, Authenticator, HmacSha256Authenticator, NullAuthenticator,
    HMAC_SHA256_MAX_TAG,
};
pub use config::{AuthenticatorKind, SecureMemoryConfig};
pub use events::{next_cycle, ControllerEvent, EventSchedule};
pub use layout::{IntegrityLayout, HMAC_LEVEL, ROOT_LEVEL};
pub use pending::{HoldStage, PendingTracker};
pub use timed_queue::TimedQueue;
