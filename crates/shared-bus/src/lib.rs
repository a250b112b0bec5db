//! # Shared Bus - Account Event Bus
//!
//! Typed publish/subscribe for account lifecycle events.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Poller /     │                    │ Websocket /  │
//! │ Promoter     │    publish()       │ CLI          │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  │              │  one channel per kind
//!                  └──────────────┘
//! ```
//!
//! ## Delivery
//!
//! - In order per kind per listener
//! - Publishers never block: a full channel drops the event for that
//!   listener and reports `InternalError(EventDropped)`
//! - `close()` delivers `Shutdown` to every listener as its last event

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{AccountEvent, EventFilter, EventKind, InternalError};
pub use publisher::{EventBus, EventPublisher};
pub use subscriber::{Listener, ListenerId, SubscriptionError};

/// Events to buffer per listener per kind before dropping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(EventBus::new().capacity(), DEFAULT_CHANNEL_CAPACITY);
    }
}
