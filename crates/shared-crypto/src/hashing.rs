//! # Hashing
//!
//! SHA-256 for identities and a SHAKE-256 sponge that squeezes tryte strings
//! for addresses, bundle hashes and transaction hashes.

use sha2::{Digest, Sha256};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use shared_types::TRYTE_ALPHABET;

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// SHA-256 rendered as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Sponge that absorbs bytes and squeezes trytes.
#[derive(Clone, Default)]
pub struct TryteSponge {
    inner: Shake256,
}

impl TryteSponge {
    /// Create new sponge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sponge with a domain-separation label already absorbed.
    pub fn with_domain(domain: &str) -> Self {
        let mut sponge = Self::new();
        sponge.absorb(domain.as_bytes()).absorb(&[0]);
        sponge
    }

    /// Absorb raw bytes.
    pub fn absorb(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Absorb a length-prefixed field so adjacent fields cannot collide.
    pub fn absorb_field(&mut self, data: &[u8]) -> &mut Self {
        self.absorb(&(data.len() as u64).to_le_bytes()).absorb(data)
    }

    /// Squeeze `n` trytes without consuming the sponge.
    pub fn squeeze_trytes(&self, n: usize) -> String {
        let mut reader = self.inner.clone().finalize_xof();
        let mut out = String::with_capacity(n);
        let mut byte = [0u8; 1];
        while out.len() < n {
            reader.read(&mut byte);
            // 243 = 27 * 9; rejecting the tail keeps the alphabet uniform.
            if byte[0] < 243 {
                out.push(TRYTE_ALPHABET[(byte[0] % 27) as usize] as char);
            }
        }
        out
    }
}
