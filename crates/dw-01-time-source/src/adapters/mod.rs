//! Adapters: the UDP SNTP client and the local system clock.

pub mod sntp;
pub mod system;

pub use sntp::UdpNtpSource;
pub use system::SystemClock;
