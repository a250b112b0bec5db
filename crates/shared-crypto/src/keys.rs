//! # Seeds and Address Derivation
//!
//! The seed never leaves this module in clear form except through
//! `Seed::expose`, which only the signer uses. Addresses are a pure function
//! of `(seed, key_index, security)`.

use crate::errors::CryptoError;
use crate::hashing::{sha256_hex, TryteSponge};
use shared_types::{is_trytes, Address, SecurityLevel, HASH_TRYTES};
use std::fmt;
use zeroize::Zeroize;

/// Account seed (up to 81 trytes). Wiped on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Seed(String);

impl Seed {
    /// Validate and wrap a seed.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidSeed` for an empty, over-long or
    /// non-tryte seed.
    pub fn new(seed: impl Into<String>) -> Result<Self, CryptoError> {
        let seed = seed.into();
        if seed.is_empty() {
            return Err(CryptoError::InvalidSeed("seed is empty".into()));
        }
        if seed.len() > HASH_TRYTES {
            return Err(CryptoError::InvalidSeed(format!(
                "seed longer than {HASH_TRYTES} trytes"
            )));
        }
        if !is_trytes(&seed) {
            return Err(CryptoError::InvalidSeed("seed must only contain A-Z and 9".into()));
        }
        Ok(Self(seed))
    }

    /// Stable account identity: hex SHA-256 of the seed.
    pub fn hash(&self) -> String {
        sha256_hex(self.0.as_bytes())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// Derive the address for `key_index` at `security`.
pub fn derive_address(seed: &Seed, key_index: u64, security: SecurityLevel) -> Address {
    let mut sponge = TryteSponge::with_domain("dw/address");
    sponge
        .absorb_field(seed.expose())
        .absorb(&key_index.to_le_bytes())
        .absorb(&[security.as_u8()]);
    Address::from_trusted(sponge.squeeze_trytes(HASH_TRYTES))
}
