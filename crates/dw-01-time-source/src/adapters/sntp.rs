//! # SNTP over UDP
//!
//! A single-shot SNTPv4 client (RFC 4330): one 48-byte request, one
//! 48-byte reply, offset from the server's receive and transmit stamps.

use crate::domain::ClockError;
use crate::ports::NtpSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

const PACKET_LEN: usize = 48;

/// LI = 0, VN = 4, Mode = 3 (client).
const CLIENT_HEADER: u8 = 0b00_100_011;

/// Queries an SNTP server over UDP.
#[derive(Debug, Clone)]
pub struct UdpNtpSource {
    timeout: Duration,
}

impl UdpNtpSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(&self, server: &str) -> Result<(DateTime<Utc>, [u8; PACKET_LEN], DateTime<Utc>), String> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| e.to_string())?;
        socket.connect(server).await.map_err(|e| e.to_string())?;

        let mut request = [0u8; PACKET_LEN];
        request[0] = CLIENT_HEADER;
        let sent_at = Utc::now();
        socket.send(&request).await.map_err(|e| e.to_string())?;

        let mut reply = [0u8; PACKET_LEN];
        let n = socket.recv(&mut reply).await.map_err(|e| e.to_string())?;
        let received_at = Utc::now();
        if n < PACKET_LEN {
            return Err(format!("short reply ({n} bytes)"));
        }
        Ok((sent_at, reply, received_at))
    }
}

impl Default for UdpNtpSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

/// Decode the 64-bit NTP timestamp at `at`.
fn read_timestamp(packet: &[u8; PACKET_LEN], at: usize) -> Option<DateTime<Utc>> {
    let seconds = u32::from_be_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]]);
    let fraction = u32::from_be_bytes([
        packet[at + 4],
        packet[at + 5],
        packet[at + 6],
        packet[at + 7],
    ]);
    if seconds == 0 && fraction == 0 {
        return None;
    }
    let nanos = ((fraction as u64 * 1_000_000_000) >> 32) as u32;
    DateTime::from_timestamp(seconds as i64 - NTP_UNIX_OFFSET, nanos)
}

/// Offset from a reply: `((T2 - T1) + (T3 - T4)) / 2`.
pub(crate) fn offset_from_reply(
    sent_at: DateTime<Utc>,
    reply: &[u8; PACKET_LEN],
    received_at: DateTime<Utc>,
) -> Result<ChronoDuration, String> {
    let mode = reply[0] & 0b111;
    if mode != 4 && mode != 5 {
        return Err(format!("unexpected mode {mode}"));
    }
    // Stratum 0 is a kiss-o'-death packet.
    if reply[1] == 0 {
        return Err("kiss-o'-death reply".to_string());
    }
    let server_received = read_timestamp(reply, 32).ok_or("missing receive timestamp")?;
    let server_sent = read_timestamp(reply, 40).ok_or("missing transmit timestamp")?;
    Ok(((server_received - sent_at) + (server_sent - received_at)) / 2)
}

#[async_trait]
impl NtpSource for UdpNtpSource {
    async fn offset(&self, server: &str) -> Result<ChronoDuration, ClockError> {
        let failed = |reason: String| ClockError::QueryFailed {
            server: server.to_string(),
            reason,
        };
        let (sent_at, reply, received_at) = timeout(self.timeout, self.exchange(server))
            .await
            .map_err(|_| failed(format!("timed out after {:?}", self.timeout)))?
            .map_err(failed)?;
        let offset = offset_from_reply(sent_at, &reply, received_at).map_err(failed)?;
        debug!(server, offset_ms = offset.num_milliseconds(), "[dw-01] SNTP sample");
        Ok(offset)
    }
}
