//! # Shared Crypto - Ledger Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256, SHAKE-256 | Seed identity, tryte squeezing |
//! | `keys` | SHAKE-256 sponge | Deterministic address derivation |
//! | `bundle` | SHAKE-256, HMAC-SHA256 | Bundle layout, hashing, signing, attachment |
//!
//! These are stand-ins with the same shapes as the ledger's native
//! primitives: every function here is pure, so two accounts with the same
//! seed derive the same addresses and signatures.

#![warn(clippy::all)]

pub mod bundle;
pub mod errors;
pub mod hashing;
pub mod keys;

// Re-exports
pub use bundle::{
    attach, bundle_hash, sign, transaction_hash, BundleBuilder, InputSpec, OutputSpec,
    DEFAULT_TAG, SIGNATURE_FRAGMENT_TRYTES,
};
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_hex, TryteSponge};
pub use keys::{derive_address, Seed};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
