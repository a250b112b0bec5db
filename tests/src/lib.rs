//! # Donation Wallet Test Suite
//!
//! Cross-crate tests for the account engine.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Account + simulated ledger + manual clock
//! └── integration/
//!     ├── scenarios.rs  # End-to-end account flows
//!     └── properties.rs # Guarantees spanning several crates
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dw-tests
//!
//! # By category
//! cargo test -p dw-tests integration::scenarios::
//! cargo test -p dw-tests integration::properties::
//!
//! # Benchmarks
//! cargo bench -p dw-tests
//! ```

pub mod fixtures;
pub mod integration;
