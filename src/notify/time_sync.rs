// Wall-clock resolution via SNTP (RFC 4330)

use super::TimeSource;
use crate::error::TimeSyncError;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout, Duration};

const NTP_PACKET_LEN: usize = 48;
/// Seconds between the NTP era origin (1900) and the Unix epoch
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;
// LI = 0, VN = 4, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0b00_100_011;

/// Build the fixed offset from the configured UTC and daylight-saving offsets.
/// Out-of-range totals fall back to UTC.
pub fn local_offset(gmt_offset_secs: i32, daylight_offset_secs: i32) -> FixedOffset {
    let total = gmt_offset_secs.saturating_add(daylight_offset_secs);
    FixedOffset::east_opt(total).unwrap_or_else(|| {
        log::warn!("UTC offset {}s out of range, using UTC", total);
        Utc.fix()
    })
}

/// Decode the transmit timestamp of a server reply
pub fn decode_reply(buf: &[u8]) -> Result<DateTime<Utc>, TimeSyncError> {
    if buf.len() < NTP_PACKET_LEN {
        return Err(TimeSyncError::BadReply(format!("short reply ({} bytes)", buf.len())));
    }

    let mode = buf[0] & 0x07;
    if mode != 4 && mode != 5 {
        return Err(TimeSyncError::BadReply(format!("unexpected mode {}", mode)));
    }
    if buf[1] == 0 {
        return Err(TimeSyncError::BadReply("kiss-o'-death reply".to_string()));
    }

    let secs = u32::from_be_bytes([buf[40], buf[41], buf[42], buf[43]]);
    let frac = u32::from_be_bytes([buf[44], buf[45], buf[46], buf[47]]);
    if secs == 0 {
        return Err(TimeSyncError::BadReply("zero transmit timestamp".to_string()));
    }

    let unix_secs = secs as i64 - NTP_UNIX_OFFSET;
    let nanos = ((frac as u64 * 1_000_000_000) >> 32) as u32;
    DateTime::<Utc>::from_timestamp(unix_secs, nanos)
        .ok_or_else(|| TimeSyncError::BadReply(format!("timestamp {} out of range", unix_secs)))
}

/// Queries an NTP server on every call
pub struct SntpClock {
    server: String,
    offset: FixedOffset,
    timeout: Duration,
}

impl SntpClock {
    pub fn new(server: &str, offset: FixedOffset, timeout: Duration) -> Self {
        Self {
            server: server.to_string(),
            offset,
            timeout,
        }
    }

    /// Resolve, send and receive, all within the configured timeout
    async fn query(&self) -> Result<DateTime<Utc>, TimeSyncError> {
        timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| TimeSyncError::Timeout(self.timeout.as_millis() as u64))?
    }

    async fn exchange(&self) -> Result<DateTime<Utc>, TimeSyncError> {
        let io = |e: std::io::Error| TimeSyncError::Io(e.to_string());

        let server = lookup_host(&self.server)
            .await
            .map_err(io)?
            .next()
            .ok_or_else(|| TimeSyncError::Io(format!("{} did not resolve", self.server)))?;
        let local = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

        let socket = UdpSocket::bind(local).await.map_err(io)?;
        socket.connect(server).await.map_err(io)?;

        let mut request = [0u8; NTP_PACKET_LEN];
        request[0] = CLIENT_HEADER;
        socket.send(&request).await.map_err(io)?;

        let mut reply = [0u8; NTP_PACKET_LEN];
        let n = socket.recv(&mut reply).await.map_err(io)?;

        decode_reply(&reply[..n])
    }
}

impl TimeSource for SntpClock {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError> {
        let utc = self.query().await?;
        Ok(utc.with_timezone(&self.offset))
    }
}

/// Host clock, for nodes whose system time is already disciplined
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl TimeSource for SystemClock {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError> {
        Ok(Utc::now().with_timezone(&self.offset))
    }
}

/// Runtime selection between the clock implementations
pub enum WallClock {
    Sntp(SntpClock),
    System(SystemClock),
}

impl TimeSource for WallClock {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError> {
        match self {
            WallClock::Sntp(clock) => clock.now().await,
            WallClock::System(clock) => clock.now().await,
        }
    }
}
