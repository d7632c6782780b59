//! Tag primitives
//!
//! The controller treats the authenticator as opaque: it fetches the tag
//! stored in the HMAC array and asks the authenticator whether the data block
//! matches it.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared_types::Addr;

use super::config::AuthenticatorKind;
use crate::error::SecureMemoryError;

type HmacSha256 = Hmac<Sha256>;

/// Longest tag an HMAC-SHA256 digest can supply.
pub const HMAC_SHA256_MAX_TAG: usize = 32;

/// Computes and checks per-block authentication tags.
pub trait Authenticator: Send + Sync {
    /// Tag for the block at `addr` holding `data`.
    fn tag(&self, addr: Addr, data: &[u8]) -> Vec<u8>;

    /// True if `tag` authenticates `data` at `addr`.
    fn verify(&self, addr: Addr, data: &[u8], tag: &[u8]) -> bool {
        self.tag(addr, data) == tag
    }
}

/// Accepts every block. Tags are still fetched, so timing is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuthenticator;

impl Authenticator for NullAuthenticator {
    fn tag(&self, _addr: Addr, _data: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn verify(&self, _addr: Addr, _data: &[u8], _tag: &[u8]) -> bool {
        true
    }
}

/// HMAC-SHA256 over `addr (little endian) || data`, truncated to `tag_len`.
#[derive(Clone)]
pub struct HmacSha256Authenticator {
    key: Vec<u8>,
    tag_len: usize,
}

impl HmacSha256Authenticator {
    pub fn new(key: Vec<u8>, tag_len: usize) -> Result<Self, SecureMemoryError> {
        if tag_len == 0 || tag_len > HMAC_SHA256_MAX_TAG {
            return Err(SecureMemoryError::Configuration(format!(
                "HMAC-SHA256 tag length must be 1..={HMAC_SHA256_MAX_TAG} bytes, got {tag_len}"
            )));
        }
        Ok(Self { key, tag_len })
    }
}

impl Authenticator for HmacSha256Authenticator {
    fn tag(&self, addr: Addr, data: &[u8]) -> Vec<u8> {
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(&addr.to_le_bytes());
        mac.update(data);
        let digest = mac.finalize().into_bytes();
        digest[..self.tag_len].to_vec()
    }

    fn verify(&self, addr: Addr, data: &[u8], tag: &[u8]) -> bool {
        if tag.len() != self.tag_len {
            return false;
        }
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(&addr.to_le_bytes());
        mac.update(data);
        mac.verify_truncated_left(tag).is_ok()
    }
}

/// Build the authenticator selected by configuration.
pub fn build_authenticator(
    kind: &AuthenticatorKind,
    tag_len: usize,
) -> Result<Box<dyn Authenticator>, SecureMemoryError> {
    Ok(match kind {
        AuthenticatorKind::Null => Box::new(NullAuthenticator),
        AuthenticatorKind::HmacSha256 { key } => {
            Box::new(HmacSha256Authenticator::new(key.clone(), tag_len)?)
        }
    })
}
