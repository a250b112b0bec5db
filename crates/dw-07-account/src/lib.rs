//! # Account Facade
//!
//! **Subsystem ID:** 7
//!
//! The only public entry point of the engine. Owns one seed, allocates
//! deposit addresses, sends bundles and runs the transfer poller and the
//! promoter in the background.
//!
//! ## Operations
//!
//! | Operation | Requires | Emits |
//! |-----------|----------|-------|
//! | `start` | created | - |
//! | `allocate_deposit_address` | running, authoritative time | - |
//! | `send` | running, oracle allows every conditioned recipient | `Sending` |
//! | `available_balance` / `total_balance` | running | - |
//! | `events` | running | - |
//! | `state_snapshot` | running | - |
//! | `shutdown` | any | `Shutdown` (last event) |
//!
//! Background failures arrive as `InternalError` events; a panicking loop
//! additionally sets `Account::fatal`.
//!
//! ## Eligibility
//!
//! A multi-use deposit address is spendable once its timeout passed. A
//! single-use address is spendable once it holds the expected amount, or
//! after its timeout. Spent addresses are never used as inputs again.

pub mod builder;
pub mod config;
pub mod domain;
pub mod oracle;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod wiring;

pub use builder::AccountBuilder;
pub use config::{
    AccountSettings, ConfigError, MongoConfig, QuorumConfig, StoreBackend, TimeConfig,
    WalletConfig,
};
pub use domain::{AccountError, Recipient};
pub use oracle::{CompositeOracle, TimeoutMarginOracle, DEFAULT_SEND_MARGIN_HOURS};
pub use ports::{OracleVerdict, SendOracle};
pub use scheduler::Scheduler;
pub use service::Account;
pub use wiring::{open_account, WiringError};
