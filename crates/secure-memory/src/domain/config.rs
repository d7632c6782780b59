//! Controller configuration and validation
//!
//! All parameters are fixed for the lifetime of a controller. The defaults
//! reproduce the reference geometry: 8-ary tree, 64-byte blocks, 8-byte tags
//! and 4 KiB pages.
//!
//! # Example
//!
//! ```ignore
//! use secure_memory::domain::SecureMemoryConfig;
//!
//! let config = SecureMemoryConfig::default()
//!     .with_inspection_buffer_entries(128)
//!     .with_arity(4);
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use shared_types::Tick;

use super::auth::HMAC_SHA256_MAX_TAG;
use crate::error::SecureMemoryError;

/// Which tag primitive checks data blocks against their HMAC entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthenticatorKind {
    /// Accept every block (tags are fetched but not checked).
    #[default]
    Null,
    /// HMAC-SHA256 over `addr || data`, truncated to the tag size.
    HmacSha256 { key: Vec<u8> },
}

/// Secure memory controller configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureMemoryConfig {
    /// Capacity of the outbound-to-memory (inspection) buffer.
    pub inspection_buffer_entries: usize,
    /// Capacity of the outbound-to-processor (response) buffer.
    pub response_buffer_entries: usize,
    /// Children per integrity tree node.
    pub arity: u64,
    /// Bytes per data block and per metadata node.
    pub block_size: u64,
    /// Bytes per authentication tag.
    pub hmac_size: u64,
    /// Bytes of data covered by one counter node.
    pub page_size: u64,
    /// Controller clock period; also the latency of both buffers.
    pub clock_period: Tick,
    /// Tag primitive.
    pub authenticator: AuthenticatorKind,
}

impl Default for SecureMemoryConfig {
    fn default() -> Self {
        Self {
            inspection_buffer_entries: 64,
            response_buffer_entries: 32,
            arity: 8,
            block_size: 64,
            hmac_size: 8,
            page_size: 4096,
            clock_period: 1000,
            authenticator: AuthenticatorKind::Null,
        }
    }
}

impl SecureMemoryConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, SecureMemoryError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SecureMemoryError::Configuration(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter consistency.
    pub fn validate(&self) -> Result<(), SecureMemoryError> {
        let invalid = |msg: String| Err(SecureMemoryError::Configuration(msg));

        if self.arity < 2 {
            return invalid(format!("arity must be at least 2, got {}", self.arity));
        }

        for (name, value) in [
            ("block_size", self.block_size),
            ("hmac_size", self.hmac_size),
            ("page_size", self.page_size),
        ] {
            if !value.is_power_of_two() {
                return invalid(format!("{name} must be a power of two, got {value}"));
            }
        }

        if self.hmac_size > self.block_size {
            return invalid(format!(
                "hmac_size {} exceeds block_size {}",
                self.hmac_size, self.block_size
            ));
        }

        if self.block_size > self.page_size {
            return invalid(format!(
                "block_size {} exceeds page_size {}",
                self.block_size, self.page_size
            ));
        }

        if self.inspection_buffer_entries == 0 || self.response_buffer_entries == 0 {
            return invalid("buffer capacities must be non-zero".to_string());
        }

        if self.clock_period == 0 {
            return invalid("clock_period must be non-zero".to_string());
        }

        if let AuthenticatorKind::HmacSha256 { key } = &self.authenticator {
            if key.is_empty() {
                return invalid("HMAC key cannot be empty".to_string());
            }
            if self.hmac_size > HMAC_SHA256_MAX_TAG as u64 {
                return invalid(format!(
                    "hmac_size {} exceeds the {HMAC_SHA256_MAX_TAG}-byte HMAC-SHA256 digest",
                    self.hmac_size
                ));
            }
        }

        Ok(())
    }

    pub fn with_inspection_buffer_entries(mut self, entries: usize) -> Self {
        self.inspection_buffer_entries = entries;
        self
    }

    pub fn with_response_buffer_entries(mut self, entries: usize) -> Self {
        self.response_buffer_entries = entries;
        self
    }

    pub fn with_arity(mut self, arity: u64) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_clock_period(mut self, period: Tick) -> Self {
        self.clock_period = period;
        self
    }

    pub fn with_authenticator(mut self, authenticator: AuthenticatorKind) -> Self {
        self.authenticator = authenticator;
        self
    }
}
