//! # Donation Server
//!
//! What the donation page needs from the account engine, as plain
//! operations. Routing and the websocket upgrade belong to the embedding
//! HTTP layer.
//!
//! | Page endpoint | Operation |
//! |---------------|-----------|
//! | `GET donation-link` | `DonationLinks::donation_link` (record) / `magnet` |
//! | `GET balance` | `balance` → `{usable, total}` |
//! | `GET live` | `LiveFeed::subscribe` → `LiveFrame`s |

pub mod errors;
pub mod feed;
pub mod frames;
pub mod links;

#[cfg(test)]
mod test_support;

pub use errors::ServerError;
pub use feed::{balance, LiveFeed, DEFAULT_FEED_CAPACITY};
pub use frames::{Balance, LiveFrame, MsgType};
pub use links::{DonationLinks, CURRENT_RECORD, RENEW_BEFORE_HOURS};
