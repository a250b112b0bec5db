//! # Shared Types Crate
//!
//! Entities and contracts used across the donation wallet subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary
//!   (addresses, hashes, transactions, error kinds) is defined here.
//! - **Validated newtypes**: tryte strings are checked once at construction
//!   and are trusted afterwards.
//! - **Loops report, never die**: the `BackgroundTask` contract returns a
//!   `TaskError` carrying an `ErrorKind`; the scheduler turns it into an event.

pub mod entities;
pub mod errors;
pub mod subsystem_trait;

pub use entities::*;
pub use errors::*;
pub use subsystem_trait::{BackgroundTask, TaskError};
