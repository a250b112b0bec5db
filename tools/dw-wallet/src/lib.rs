//! # dw-wallet
//!
//! Terminal wallet over the account engine. Each input line is a command:
//!
//! | Line | Effect |
//! |------|--------|
//! | `state` | print the persisted account state as JSON |
//! | `balance` | print usable and total balance |
//! | anything else | parse as a magnet link and pay the configured amount |

pub mod session;

pub use session::{Command, Session, MIN_LINK_HOURS, OWN_ADDRESS_HOURS};
